use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{BasePaths, FileCategory, FileDeclarations, StageConfig};
use crate::error::{Result, TrackError};
use crate::runtime::stage::StageId;

/// Concrete paths of one stage. Derived from the id on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSet {
    pub deps: Vec<PathBuf>,
    pub outs: Vec<PathBuf>,
    pub outs_no_cache: Vec<PathBuf>,
    pub outs_persistent: Vec<PathBuf>,
    pub params: Vec<PathBuf>,
    pub metrics: Vec<PathBuf>,
    pub metrics_no_cache: Vec<PathBuf>,
    pub plots: Vec<PathBuf>,
    pub plots_no_cache: Vec<PathBuf>,
    pub results_file: Option<PathBuf>,
}

impl FileSet {
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

    fn get_mut(&mut self, category: FileCategory) -> &mut Vec<PathBuf> {
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

    /// Every declared path with its category, categories in canonical order,
    /// paths in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (FileCategory, &Path)> + '_ {
        FileCategory::ALL.into_iter().flat_map(move |category| {
            self.get(category)
                .iter()
                .map(move |path| (category, path.as_path()))
        })
    }

    /// Results path, or `NoResultsFile` when the node has none configured.
    pub fn results_file(&self, node_type: &str) -> Result<&Path> {
        self.results_file
            .as_deref()
            .ok_or_else(|| TrackError::NoResultsFile(node_type.to_string()))
    }

    /// Create the parent directory of every path in the set.
    pub fn create_parent_dirs(&self) -> Result<()> {
        let results = self.results_file.iter().map(PathBuf::as_path);
        for path in self.iter().map(|(_, p)| p).chain(results) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
            }
        }
        Ok(())
    }
}

pub struct FileSetBuilder;

impl FileSetBuilder {
    /// `<base path of category>/<id>_<declared name>` for every declaration. Pure.
    pub fn build(
        declarations: &FileDeclarations,
        results_file: Option<&str>,
        id: StageId,
        paths: &BasePaths,
    ) -> FileSet {
        let mut files = FileSet::default();
        for category in FileCategory::ALL {
            let base = paths.get(category);
            *files.get_mut(category) = declarations
                .get(category)
                .iter()
                .map(|name| Self::stage_path(base, id, name))
                .collect();
        }
        files.results_file = results_file.map(|name| Self::stage_path(&paths.outs, id, Path::new(name)));
        files
    }

    pub fn for_stage(config: &StageConfig, id: StageId) -> FileSet {
        Self::build(&config.files, config.results_file.as_deref(), id, &config.paths)
    }

    fn stage_path(base: &Path, id: StageId, name: &Path) -> PathBuf {
        base.join(format!("{}_{}", id, name.display()))
    }
}
