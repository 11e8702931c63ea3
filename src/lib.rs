pub mod config;
pub mod error;
pub mod nodes;
pub mod runtime;

pub use error::{Result, TrackError};
pub use runtime::node::{Node, NodeKind, NodeState, NodeType};
pub use runtime::stage::{ParameterSet, StageId};
pub use runtime::storage::ParameterStore;
pub use runtime::tracker::Tracker;
