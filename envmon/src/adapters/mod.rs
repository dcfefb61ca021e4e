//! In-memory collaborator implementations.
//!
//! Used by the CLI host and by tests. Production deployments back these
//! traits with the platform database.

mod data;
mod logger;

pub use data::MemoryDataManager;
pub use logger::{ExecutionRecord, MemoryProcessLogger};
