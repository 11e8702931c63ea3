use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TrackError};

/// The executor's own stage registry (e.g. `dvc.yaml`). Only single entries are read.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineDocument {
    #[serde(default)]
    stages: Mapping,
}

impl PipelineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry for `stage_name`, or `None` if the file or the stage does not exist.
    pub fn stage(&self, stage_name: &str) -> Result<Option<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Pipeline file not found");
                return Ok(None);
            }
            Err(e) => return Err(TrackError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let document: PipelineDocument =
            serde_yaml::from_str(&content).map_err(|source| TrackError::PipelineCorrupt {
                path: self.path.clone(),
                source,
            })?;

        Ok(document.stages.get(stage_name).cloned())
    }
}
