use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ProjectConfig;
use crate::error::{Result, TrackError};
use crate::runtime::identity::IdentityResolver;
use crate::runtime::node::{Node, NodeKind, NodeType, NodeState};
use crate::runtime::pipeline::PipelineFile;
use crate::runtime::query::QueryEngine;
use crate::runtime::stage::{ParameterSet, StageId};
use crate::runtime::storage::ParameterStore;

struct Registration {
    node_type: NodeType,
    kind: Arc<dyn NodeKind>,
}

/// Registry of node kinds plus the store they share.
pub struct Tracker {
    store: ParameterStore,
    resolver: IdentityResolver,
    pipeline: PipelineFile,
    config: ProjectConfig,
    registry: HashMap<String, Registration>,
}

impl Tracker {
    pub fn new(config: ProjectConfig) -> Self {
        let store = ParameterStore::new(&config.params_file).with_lock_timeout(config.lock_timeout());
        Self {
            store,
            resolver: IdentityResolver::new(config.allocation),
            pipeline: PipelineFile::new(&config.pipeline_file),
            config,
            registry: HashMap::new(),
        }
    }

    /// Register a kind. A `nodes.<type_name>` entry in the project config replaces the
    /// kind's own stage config.
    pub fn register_node(&mut self, kind: Arc<dyn NodeKind>) {
        let name = kind.type_name().to_string();
        let stage_config = self
            .config
            .nodes
            .get(&name)
            .cloned()
            .unwrap_or_else(|| kind.config());
        let node_type = NodeType::new(name.clone(), stage_config);
        self.registry.insert(name, Registration { node_type, kind });
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn node_type(&self, type_name: &str) -> Result<&NodeType> {
        self.registration(type_name).map(|r| &r.node_type)
    }

    pub fn new_node(&self, type_name: &str) -> Result<Node> {
        Ok(Node::new(self.node_type(type_name)?.clone()))
    }

    /// Set parameters on a fresh node, persist them and create its directories.
    pub fn configure<T: Serialize>(&self, type_name: &str, parameters: T) -> Result<Node> {
        let mut node = self.new_node(type_name)?;
        node.set_parameters(parameters)?;
        node.config().paths.create_all()?;
        node.configure(&self.store, &self.resolver)?;
        node.files()?.create_parent_dirs()?;
        Ok(node)
    }

    /// Executor re-entry: rebuild the stage by id, run its kind and record the results.
    pub fn run_stage(&self, type_name: &str, id: StageId) -> anyhow::Result<Node> {
        let registration = self.registration(type_name)?;
        let mut node = Node::enter_running(registration.node_type.clone(), &self.store, id)?;

        let results = match registration.kind.run(&mut node) {
            Ok(results) => results,
            Err(e) => {
                error!(node_type = type_name, stage_id = %id, error = ?e, "Stage failed");
                return Err(e);
            }
        };

        if node.state() == NodeState::Running {
            node.complete(results.as_ref())?;
        }
        info!(node_type = type_name, stage_id = %id, "Stage finished");
        Ok(node)
    }

    pub fn get_by_id(&self, type_name: &str, id: StageId) -> Result<Node> {
        QueryEngine::new(&self.store).get_by_id(self.node_type(type_name)?, id)
    }

    pub fn query(&self, type_name: &str, filter: &ParameterSet) -> Result<Vec<Node>> {
        QueryEngine::new(&self.store).query(self.node_type(type_name)?, filter)
    }

    /// The pipeline-file entry for the node's stage name.
    pub fn pipeline_stage(&self, node: &Node) -> Result<Option<serde_yaml::Value>> {
        match node.stage_name() {
            Some(name) => self.pipeline.stage(&name),
            None => Ok(None),
        }
    }

    pub fn read_results(&self, type_name: &str, id: StageId) -> Result<Value> {
        self.get_by_id(type_name, id)?.read_results()
    }

    fn registration(&self, type_name: &str) -> Result<&Registration> {
        self.registry
            .get(type_name)
            .ok_or_else(|| TrackError::UnknownNodeType(type_name.to_string()))
    }
}
