use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Result, TrackError};

const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Advisory lock on the parameter store, held on a sidecar `<store>.lock` file.
/// The OS releases it when the holder exits, so a leftover lock file never blocks writers.
/// Works across processes as well as threads. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        store_path.with_file_name(name)
    }

    pub fn acquire(store_path: &Path, timeout: Duration) -> Result<StoreLock> {
        let path = Self::lock_path(store_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
        }

        // The file itself is never removed: unlinking a locked file lets a second
        // writer lock a fresh inode under the same name.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| TrackError::io(&path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => break,
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(path = %path.display(), ?waited, "Gave up waiting for store lock");
                        return Err(TrackError::LockTimeout { path, waited });
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(TryLockError::Error(e)) => return Err(TrackError::io(&path, e)),
            }
        }

        // Owner pid, for diagnostics only
        if let Err(e) = file.set_len(0).and_then(|_| writeln!(file, "{}", std::process::id())) {
            debug!(path = %path.display(), error = %e, "Could not record lock owner");
        }
        debug!(path = %path.display(), "Store lock acquired");
        Ok(StoreLock { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }
}
