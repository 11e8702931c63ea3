use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::StageConfig;
use crate::error::{Result, TrackError};
use crate::runtime::files::{FileSet, FileSetBuilder};
use crate::runtime::identity::IdentityResolver;
use crate::runtime::stage::{ParameterSet, StageId, stage_name, to_parameter_set};
use crate::runtime::storage::{ParameterStore, write_atomically};

/// 节点定义接口 (Node Kind)
/// Implemented by callers for every kind of parameterized computation.
pub trait NodeKind: Send + Sync + Debug {
    /// Explicit type identifier, used as the store key and stage name prefix.
    fn type_name(&self) -> &str;

    fn config(&self) -> StageConfig {
        StageConfig::default()
    }

    /// Execution entry point. Called with a `Running` node whose parameters were read
    /// back from the store. A returned value is written as the results document.
    fn run(&self, node: &mut Node) -> anyhow::Result<Option<Value>>;
}

/// Type name plus the stage configuration registered for it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    name: String,
    config: Arc<StageConfig>,
}

impl NodeType {
    pub fn new(name: impl Into<String>, config: StageConfig) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
        }
    }

    pub fn of(kind: &dyn NodeKind) -> Self {
        Self::new(kind.type_name(), kind.config())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Fresh, parameters being set.
    Configuring,
    /// Id resolved and parameters persisted. Also the state of query results.
    Configured,
    /// Re-entered by the executor with an explicit id.
    Running,
    Done,
}

/// Transient view of one stage over the parameter store.
#[derive(Debug, Clone)]
pub struct Node {
    node_type: NodeType,
    state: NodeState,
    /// Set by the caller while configuring.
    configured: ParameterSet,
    /// Read back from the store (reconstructed, running) or just written to it (configured).
    persisted: Option<ParameterSet>,
    id: Option<StageId>,
}

impl Node {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            state: NodeState::Configuring,
            configured: ParameterSet::new(),
            persisted: None,
            id: None,
        }
    }

    pub(crate) fn reconstructed(node_type: NodeType, id: StageId, parameters: ParameterSet) -> Self {
        Self {
            node_type,
            state: NodeState::Configured,
            configured: ParameterSet::new(),
            persisted: Some(parameters),
            id: Some(id),
        }
    }

    /// Rebuild the node the executor asked for. Parameters come from the store only.
    pub fn enter_running(node_type: NodeType, store: &ParameterStore, id: StageId) -> Result<Self> {
        let parameters = store
            .get(node_type.name(), id)?
            .ok_or_else(|| TrackError::UnknownStage {
                node_type: node_type.name().to_string(),
                id: id.to_string(),
            })?;

        info!(node_type = node_type.name(), stage_id = %id, "Entering running state");
        Ok(Self {
            node_type,
            state: NodeState::Running,
            configured: ParameterSet::new(),
            persisted: Some(parameters),
            id: Some(id),
        })
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    pub fn type_name(&self) -> &str {
        self.node_type.name()
    }

    pub fn config(&self) -> &StageConfig {
        self.node_type.config()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running
    }

    pub fn id(&self) -> Option<StageId> {
        self.id
    }

    pub fn stage_name(&self) -> Option<String> {
        self.id.map(|id| stage_name(self.type_name(), id))
    }

    /// The parameter set that is authoritative in the current state: the caller's values
    /// while configuring, the stored values in every later state.
    pub fn parameters(&self) -> &ParameterSet {
        match (self.state, &self.persisted) {
            (NodeState::Configuring, _) | (_, None) => &self.configured,
            (_, Some(persisted)) => persisted,
        }
    }

    /// Parameters set by the caller on this instance. Empty for nodes rebuilt from the store.
    pub fn configured_parameters(&self) -> &ParameterSet {
        &self.configured
    }

    /// Parameters recorded in the store under `id`.
    pub fn persisted_parameters(&self, store: &ParameterStore, id: StageId) -> Result<ParameterSet> {
        store
            .get(self.type_name(), id)?
            .ok_or_else(|| TrackError::UnknownStage {
                node_type: self.type_name().to_string(),
                id: id.to_string(),
            })
    }

    pub fn set_parameters<T: Serialize>(&mut self, parameters: T) -> Result<()> {
        self.require(
            matches!(self.state, NodeState::Configuring | NodeState::Configured),
            "Configuring or Configured",
        )?;
        self.configured = to_parameter_set(self.type_name(), parameters)?;
        // Any previous id and record belonged to the old parameter set
        self.state = NodeState::Configuring;
        self.persisted = None;
        self.id = None;
        Ok(())
    }

    /// Configuring -> Configured: resolve the id and persist the parameters under it.
    /// Resolution and the write happen under one store lock.
    pub fn configure(&mut self, store: &ParameterStore, resolver: &IdentityResolver) -> Result<StageId> {
        self.require(self.state == NodeState::Configuring, "Configuring")?;

        let name = self.node_type.name();
        let multi_use = self.node_type.config().multi_use;
        let parameters = &self.configured;

        let id = store.update(|document| {
            let id = resolver.resolve_document(document, name, multi_use, parameters, None)?;
            document.insert(name, id, parameters.clone());
            Ok(id)
        })?;

        info!(node_type = name, stage_id = %id, "Stage configured");
        self.persisted = Some(self.configured.clone());
        self.id = Some(id);
        self.state = NodeState::Configured;
        Ok(id)
    }

    pub fn files(&self) -> Result<FileSet> {
        let id = self.resolved_id()?;
        Ok(FileSetBuilder::for_stage(self.config(), id))
    }

    pub fn results_path(&self) -> Result<PathBuf> {
        let files = self.files()?;
        files.results_file(self.type_name()).map(|p| p.to_path_buf())
    }

    pub fn read_results(&self) -> Result<Value> {
        let path = self.results_path()?;
        let content = fs::read_to_string(&path).map_err(|e| TrackError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|source| TrackError::ResultsCorrupt { path, source })
    }

    /// Replace the results document as a whole.
    pub fn write_results(&self, results: &Value) -> Result<()> {
        let path = self.results_path()?;
        let bytes = serde_json::to_vec_pretty(results)
            .map_err(|source| TrackError::ResultsCorrupt { path: path.clone(), source })?;
        write_atomically(&path, &bytes)?;
        debug!(node_type = self.type_name(), path = %path.display(), "Results written");
        Ok(())
    }

    /// Running -> Done, writing results if there are any.
    pub fn complete(&mut self, results: Option<&Value>) -> Result<()> {
        self.require(self.state == NodeState::Running, "Running")?;
        if let Some(results) = results {
            self.write_results(results)?;
        }
        self.state = NodeState::Done;
        Ok(())
    }

    /// Whether a results document exists on disk for this stage.
    /// Fails like [`Node::results_path`] when there is no id or no results file configured.
    pub fn has_results(&self) -> Result<bool> {
        Ok(self.results_path()?.is_file())
    }

    fn resolved_id(&self) -> Result<StageId> {
        self.id.ok_or_else(|| TrackError::InvalidState {
            node_type: self.type_name().to_string(),
            found: self.state,
            expected: "a resolved stage id",
        })
    }

    fn require(&self, ok: bool, expected: &'static str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(TrackError::InvalidState {
                node_type: self.type_name().to_string(),
                found: self.state,
                expected,
            })
        }
    }
}
