//! Service lifecycle errors.

use std::io;
use thiserror::Error;

/// Errors surfaced synchronously by the service's public lifecycle calls.
///
/// Everything that goes wrong inside the main loop, a worker or a timer is
/// logged and absorbed instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// `start` was called while the main loop is running.
    #[error("service is already running")]
    AlreadyRunning,

    /// The OS refused to create a service thread.
    #[error("failed to spawn service thread: {0}")]
    ThreadSpawn(#[source] io::Error),
}
