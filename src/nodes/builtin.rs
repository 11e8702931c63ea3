use serde_json::Value;
use tracing::info;

use crate::config::StageConfig;
use crate::runtime::node::{Node, NodeKind};

/// Writes its own parameters back out as the results document.
#[derive(Debug, Default)]
pub struct EchoNode;

impl EchoNode {
    pub const TYPE_NAME: &'static str = "echo";
}

impl NodeKind for EchoNode {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn config(&self) -> StageConfig {
        StageConfig {
            multi_use: true,
            results_file: Some("results.json".to_string()),
            ..StageConfig::default()
        }
    }

    fn run(&self, node: &mut Node) -> anyhow::Result<Option<Value>> {
        info!("[ECHO] {:?}", node.parameters());
        Ok(Some(Value::Object(node.parameters().clone())))
    }
}
