pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackError};

/// File categories a stage can declare, in the order the pipeline tool expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Deps,
    Outs,
    OutsNoCache,
    OutsPersistent,
    Params,
    Metrics,
    MetricsNoCache,
    Plots,
    PlotsNoCache,
}

impl FileCategory {
    pub const ALL: [FileCategory; 9] = [
        FileCategory::Deps,
        FileCategory::Outs,
        FileCategory::OutsNoCache,
        FileCategory::OutsPersistent,
        FileCategory::Params,
        FileCategory::Metrics,
        FileCategory::MetricsNoCache,
        FileCategory::Plots,
        FileCategory::PlotsNoCache,
    ];
}

/// 文件声明 (File Declarations)
/// Names as the node declares them; the stage id prefix is added by the FileSetBuilder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeclarations {
    pub deps: Vec<PathBuf>,
    pub outs: Vec<PathBuf>,
    pub outs_no_cache: Vec<PathBuf>,
    pub outs_persistent: Vec<PathBuf>,
    pub params: Vec<PathBuf>,
    pub metrics: Vec<PathBuf>,
    pub metrics_no_cache: Vec<PathBuf>,
    pub plots: Vec<PathBuf>,
    pub plots_no_cache: Vec<PathBuf>,
}

impl FileDeclarations {
    pub fn get(&self, category: FileCategory) -> &[PathBuf] {
        match category {
            FileCategory::Deps => &self.deps,
            FileCategory::Outs => &self.outs,
            FileCategory::OutsNoCache => &self.outs_no_cache,
            FileCategory::OutsPersistent => &self.outs_persistent,
            FileCategory::Params => &self.params,
            FileCategory::Metrics => &self.metrics,
            FileCategory::MetricsNoCache => &self.metrics_no_cache,
            FileCategory::Plots => &self.plots,
            FileCategory::PlotsNoCache => &self.plots_no_cache,
        }
    }

    pub fn get_mut(&mut self, category: FileCategory) -> &mut Vec<PathBuf> {
        match category {
            FileCategory::Deps => &mut self.deps,
            FileCategory::Outs => &mut self.outs,
            FileCategory::OutsNoCache => &mut self.outs_no_cache,
            FileCategory::OutsPersistent => &mut self.outs_persistent,
            FileCategory::Params => &mut self.params,
            FileCategory::Metrics => &mut self.metrics,
            FileCategory::MetricsNoCache => &mut self.metrics_no_cache,
            FileCategory::Plots => &mut self.plots,
            FileCategory::PlotsNoCache => &mut self.plots_no_cache,
        }
    }
}

/// Base directory per file category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasePaths {
    pub deps: PathBuf,
    pub outs: PathBuf,
    pub outs_no_cache: PathBuf,
    pub outs_persistent: PathBuf,
    pub params: PathBuf,
    pub metrics: PathBuf,
    pub metrics_no_cache: PathBuf,
    pub plots: PathBuf,
    pub plots_no_cache: PathBuf,
}

impl Default for BasePaths {
    fn default() -> Self {
        Self {
            deps: PathBuf::from("config"),
            outs: PathBuf::from("outs"),
            outs_no_cache: PathBuf::from("outs"),
            outs_persistent: PathBuf::from("outs"),
            params: PathBuf::from("config"),
            metrics: PathBuf::from("outs"),
            metrics_no_cache: PathBuf::from("outs"),
            plots: PathBuf::from("outs"),
            plots_no_cache: PathBuf::from("outs"),
        }
    }
}

impl BasePaths {
    /// All categories rooted under one directory.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        let mut paths = defaults.clone();
        for category in FileCategory::ALL {
            *paths.get_mut(category) = root.join(defaults.get(category));
        }
        paths
    }

    pub fn get(&self, category: FileCategory) -> &Path {
        match category {
            FileCategory::Deps => &self.deps,
            FileCategory::Outs => &self.outs,
            FileCategory::OutsNoCache => &self.outs_no_cache,
            FileCategory::OutsPersistent => &self.outs_persistent,
            FileCategory::Params => &self.params,
            FileCategory::Metrics => &self.metrics,
            FileCategory::MetricsNoCache => &self.metrics_no_cache,
            FileCategory::Plots => &self.plots,
            FileCategory::PlotsNoCache => &self.plots_no_cache,
        }
    }

    fn get_mut(&mut self, category: FileCategory) -> &mut PathBuf {
        match category {
            FileCategory::Deps => &mut self.deps,
            FileCategory::Outs => &mut self.outs,
            FileCategory::OutsNoCache => &mut self.outs_no_cache,
            FileCategory::OutsPersistent => &mut self.outs_persistent,
            FileCategory::Params => &mut self.params,
            FileCategory::Metrics => &mut self.metrics,
            FileCategory::MetricsNoCache => &mut self.metrics_no_cache,
            FileCategory::Plots => &mut self.plots,
            FileCategory::PlotsNoCache => &mut self.plots_no_cache,
        }
    }

    /// Create every base directory.
    pub fn create_all(&self) -> Result<()> {
        for category in FileCategory::ALL {
            let dir = self.get(category);
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(dir).map_err(|e| TrackError::io(dir, e))?;
        }
        Ok(())
    }
}

/// 阶段配置 (Stage Configuration)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Allows more than one parameter set (and id) for this node type.
    pub multi_use: bool,
    /// Name of the results JSON, written under the outs base path.
    pub results_file: Option<String>,
    pub files: FileDeclarations,
    pub paths: BasePaths,
}

/// How a fresh stage id is chosen when no stored parameter set matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Number of stored entries for the node type. Can collide after out-of-band deletions.
    #[default]
    EntryCount,
    /// Highest stored id plus one.
    NextAfterMax,
}

/// Project-wide settings (stagetrack.yaml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub params_file: PathBuf,
    pub pipeline_file: PathBuf,
    pub allocation: AllocationPolicy,
    pub lock_timeout_ms: u64,
    /// Per node type overrides of the kind's own StageConfig.
    pub nodes: HashMap<String, StageConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            params_file: PathBuf::from("config").join("params.json"),
            pipeline_file: PathBuf::from("dvc.yaml"),
            allocation: AllocationPolicy::default(),
            lock_timeout_ms: 10_000,
            nodes: HashMap::new(),
        }
    }
}

impl ProjectConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
