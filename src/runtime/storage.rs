use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, TrackError};
use crate::runtime::lock::StoreLock;
use crate::runtime::stage::{ParameterSet, StageId, json_kind};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Stage id -> parameter set for one node type. Iterates in ascending id order.
pub type Stages = BTreeMap<StageId, ParameterSet>;

/// 参数文档 (Parameter Document)
/// `{ node_type: { stage_id: { ...parameters } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreDocument {
    node_types: BTreeMap<String, Stages>,
}

impl StoreDocument {
    pub fn stages(&self, node_type: &str) -> Option<&Stages> {
        self.node_types.get(node_type)
    }

    pub fn get(&self, node_type: &str, id: StageId) -> Option<&ParameterSet> {
        self.node_types.get(node_type).and_then(|stages| stages.get(&id))
    }

    /// Set or overwrite one record, leaving every other record untouched.
    pub fn insert(&mut self, node_type: &str, id: StageId, parameters: ParameterSet) {
        match self.node_types.get_mut(node_type) {
            Some(stages) => {
                debug!(node_type, stage_id = %id, "Updating existing node type");
                stages.insert(id, parameters);
            }
            None => {
                debug!(node_type, stage_id = %id, "Creating a new node type");
                self.node_types
                    .insert(node_type.to_string(), Stages::from([(id, parameters)]));
            }
        }
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.node_types.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
    }
}

/// File-backed parameter store shared by every node type and every run.
/// All mutations are whole-document read-modify-write cycles under a [`StoreLock`].
#[derive(Debug, Clone)]
pub struct ParameterStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl ParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. A missing file is an empty store.
    pub fn load(&self) -> Result<StoreDocument> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Parameter store not found, treating as empty");
                return Ok(StoreDocument::default());
            }
            Err(e) => return Err(TrackError::io(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|source| TrackError::StoreCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub fn stages(&self, node_type: &str) -> Result<Stages> {
        Ok(self.load()?.stages(node_type).cloned().unwrap_or_default())
    }

    pub fn get(&self, node_type: &str, id: StageId) -> Result<Option<ParameterSet>> {
        Ok(self.load()?.get(node_type, id).cloned())
    }

    /// Merge one record into the stored document and write it back.
    pub fn merge_and_save(&self, node_type: &str, id: StageId, parameters: &Value) -> Result<()> {
        // Rejected before the lock is taken so nothing is written
        let parameters = match parameters {
            Value::Object(map) => map.clone(),
            other => {
                return Err(TrackError::InvalidParameterSet {
                    node_type: node_type.to_string(),
                    found: json_kind(other).to_string(),
                });
            }
        };

        self.update(|document| {
            document.insert(node_type, id, parameters);
            Ok(())
        })
    }

    /// Run `f` against the freshly loaded document while holding the store lock,
    /// then replace the file with the result. Nothing is written if `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreDocument) -> Result<T>,
    {
        let _lock = StoreLock::acquire(&self.path, self.lock_timeout)?;

        let mut document = self.load()?;
        let output = f(&mut document)?;
        self.write(&document)?;
        Ok(output)
    }

    fn write(&self, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| TrackError::StoreCorrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomically(&self.path, &bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Parameter store written");
        Ok(())
    }
}

/// Replace `path` as a whole: temp file in the same directory, then rename over it.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| TrackError::io(&parent, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| TrackError::io(&parent, e))?;
    tmp.write_all(bytes).map_err(|e| TrackError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| TrackError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| TrackError::io(path, e.error))?;
    Ok(())
}
