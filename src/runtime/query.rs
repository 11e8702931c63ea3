use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TrackError};
use crate::runtime::node::{Node, NodeType};
use crate::runtime::stage::{ParameterSet, StageId};
use crate::runtime::storage::ParameterStore;

/// Read-only lookups over the parameter store that rebuild historical nodes.
pub struct QueryEngine<'a> {
    store: &'a ParameterStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a ParameterStore) -> Self {
        Self { store }
    }

    /// The stage recorded under `id`, reconstructed in `Configured` state.
    pub fn get_by_id(&self, node_type: &NodeType, id: StageId) -> Result<Node> {
        let parameters = self
            .store
            .get(node_type.name(), id)?
            .ok_or_else(|| TrackError::UnknownStage {
                node_type: node_type.name().to_string(),
                id: id.to_string(),
            })?;
        Ok(Node::reconstructed(node_type.clone(), id, parameters))
    }

    /// Every stage whose parameters contain all `filter` pairs, in ascending id order.
    /// Entries missing a filtered key are skipped. Empty when nothing matches.
    pub fn query(&self, node_type: &NodeType, filter: &ParameterSet) -> Result<Vec<Node>> {
        let stages = self.store.stages(node_type.name())?;

        let nodes: Vec<Node> = stages
            .into_iter()
            .filter(|(_, parameters)| matches_filter(parameters, filter))
            .map(|(id, parameters)| Node::reconstructed(node_type.clone(), id, parameters))
            .collect();

        debug!(node_type = node_type.name(), matches = nodes.len(), "Query finished");
        Ok(nodes)
    }

    /// Every recorded stage of the node type.
    pub fn all(&self, node_type: &NodeType) -> Result<Vec<Node>> {
        self.query(node_type, &ParameterSet::new())
    }
}

pub fn matches_filter(parameters: &ParameterSet, filter: &ParameterSet) -> bool {
    filter
        .iter()
        .all(|(key, expected)| parameters.get(key).is_some_and(|value: &Value| value == expected))
}
