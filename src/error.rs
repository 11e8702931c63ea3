use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::runtime::node::NodeState;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Parameter store {path} is not valid JSON: {source}")]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid parameter set for {node_type}: expected a JSON object but found {found}")]
    InvalidParameterSet { node_type: String, found: String },

    #[error("Unknown stage {node_type}_{id}")]
    UnknownStage { node_type: String, id: String },

    #[error("Node {0} has no results file configured")]
    NoResultsFile(String),

    #[error("Results file {path} is not valid JSON: {source}")]
    ResultsCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid stage id: {0:?}")]
    InvalidStageId(String),

    #[error("No stage id left to allocate for node type {node_type}")]
    StageIdExhausted { node_type: String },

    #[error("Node {node_type} is {found:?} but the operation requires {expected}")]
    InvalidState {
        node_type: String,
        found: NodeState,
        expected: &'static str,
    },

    #[error("Node type not registered: {0}")]
    UnknownNodeType(String),

    #[error("Pipeline file {path} is invalid: {source}")]
    PipelineCorrupt {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Could not lock {path} within {waited:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
