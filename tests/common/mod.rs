#![allow(dead_code)]

use anyhow::Result;
use serde_json::Value;
use stagetrack::config::{AllocationPolicy, BasePaths, FileDeclarations, ProjectConfig, StageConfig};
use stagetrack::{Node, NodeKind, Tracker};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Multi-use kind rooted in a temp directory; its run echoes `name` into the results.
#[derive(Debug)]
pub struct BasicNode {
    pub type_name: String,
    pub root: PathBuf,
    pub multi_use: bool,
}

impl BasicNode {
    pub fn new(type_name: &str, root: &Path, multi_use: bool) -> Self {
        Self {
            type_name: type_name.to_string(),
            root: root.to_path_buf(),
            multi_use,
        }
    }
}

impl NodeKind for BasicNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn config(&self) -> StageConfig {
        StageConfig {
            multi_use: self.multi_use,
            results_file: Some("results.json".to_string()),
            files: FileDeclarations {
                deps: vec![PathBuf::from("input.json")],
                outs: vec![PathBuf::from("model.bin")],
                metrics: vec![PathBuf::from("metrics.json")],
                ..FileDeclarations::default()
            },
            paths: BasePaths::under(&self.root),
        }
    }

    fn run(&self, node: &mut Node) -> Result<Option<Value>> {
        let name = node.parameters().get("name").cloned().unwrap_or(Value::Null);
        Ok(Some(serde_json::json!({ "name": name })))
    }
}

pub fn project_config(root: &Path) -> ProjectConfig {
    ProjectConfig {
        params_file: root.join("config").join("params.json"),
        pipeline_file: root.join("dvc.yaml"),
        allocation: AllocationPolicy::EntryCount,
        ..ProjectConfig::default()
    }
}

pub fn tracker_with(root: &Path, kinds: Vec<Arc<dyn NodeKind>>) -> Tracker {
    let mut tracker = Tracker::new(project_config(root));
    for kind in kinds {
        tracker.register_node(kind);
    }
    tracker
}
