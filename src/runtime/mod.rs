pub mod files;
pub mod identity;
pub mod lock;
pub mod node;
pub mod pipeline;
pub mod query;
pub mod stage;
pub mod storage;
pub mod tracker;
