//! envmon - process scheduling core for environmental-monitoring services
//!
//! Every long-running envmon service (data collection, analysis,
//! interpolation, views) runs its registered processes through the same
//! engine: per-process timers, a FIFO admission queue that keeps at most one
//! execution per process in flight, and a resizable worker pool that shields
//! the service from failures in user-supplied analysis code.
//!
//! # High-Level API
//!
//! ```ignore
//! use envmon::adapters::{MemoryDataManager, MemoryProcessLogger};
//! use envmon::scheduler::{Service, ServiceConfig};
//!
//! let service = Service::new(ServiceConfig::default(), data_manager, runner);
//! service.set_logger(Arc::new(MemoryProcessLogger::new()));
//! service.start(4)?;
//! service.add_process_to_schedule(&process);
//! ```

pub mod adapters;
pub mod config;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod time;

/// Version of the envmon library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
