use tracing::{debug, warn};

use crate::config::AllocationPolicy;
use crate::error::{Result, TrackError};
use crate::runtime::stage::{ParameterSet, StageId};
use crate::runtime::storage::{ParameterStore, Stages, StoreDocument};

/// Assigns stage ids by content: a parameter set already recorded for the node type
/// gets its existing id back, anything else gets a fresh one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    policy: AllocationPolicy,
}

impl IdentityResolver {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Resolve against the current store contents.
    ///
    /// `running` carries the id the executor passed in; at execution time the id is
    /// already fixed and is returned as is.
    pub fn resolve(
        &self,
        store: &ParameterStore,
        node_type: &str,
        multi_use: bool,
        candidate: &ParameterSet,
        running: Option<StageId>,
    ) -> Result<StageId> {
        if let Some(id) = running {
            return Ok(id);
        }
        if !multi_use {
            return Ok(StageId::DEFAULT);
        }
        let document = store.load()?;
        self.resolve_document(&document, node_type, multi_use, candidate, None)
    }

    /// Same contract as [`IdentityResolver::resolve`] against a document the caller
    /// already holds, e.g. inside [`ParameterStore::update`].
    pub fn resolve_document(
        &self,
        document: &StoreDocument,
        node_type: &str,
        multi_use: bool,
        candidate: &ParameterSet,
        running: Option<StageId>,
    ) -> Result<StageId> {
        match running {
            Some(id) => Ok(id),
            None if !multi_use => Ok(StageId::DEFAULT),
            None => self.resolve_in(node_type, document.stages(node_type), candidate),
        }
    }

    /// Configure-time resolution of a multi-use node against an already loaded document.
    /// Fails with [`TrackError::StageIdExhausted`] when no fresh id can be allocated.
    pub fn resolve_in(
        &self,
        node_type: &str,
        stages: Option<&Stages>,
        candidate: &ParameterSet,
    ) -> Result<StageId> {
        let stages = match stages {
            Some(stages) if !stages.is_empty() => stages,
            _ => return Ok(StageId::DEFAULT),
        };

        // Stages iterate in ascending id order, so the first match is the lowest id
        let mut matches = stages
            .iter()
            .filter(|(_, stored)| *stored == candidate)
            .map(|(id, _)| *id);

        if let Some(id) = matches.next() {
            let others: Vec<StageId> = matches.collect();
            if !others.is_empty() {
                warn!(
                    node_type,
                    stage_id = %id,
                    duplicates = ?others,
                    "Parameter set recorded under several ids, reusing the lowest"
                );
            }
            debug!(node_type, stage_id = %id, "Reusing existing stage");
            return Ok(id);
        }

        let fresh = match self.policy {
            AllocationPolicy::EntryCount => StageId(stages.len() as u64),
            AllocationPolicy::NextAfterMax => match stages.keys().next_back() {
                Some(max) => max.checked_next().ok_or_else(|| {
                    warn!(node_type, stage_id = %max, "Highest stage id has no successor");
                    TrackError::StageIdExhausted {
                        node_type: node_type.to_string(),
                    }
                })?,
                None => StageId::DEFAULT,
            },
        };

        if stages.contains_key(&fresh) {
            warn!(
                node_type,
                stage_id = %fresh,
                "Fresh id collides with an existing stage, its parameters will be overwritten"
            );
        }
        debug!(node_type, stage_id = %fresh, "Allocated new stage id");
        Ok(fresh)
    }
}
