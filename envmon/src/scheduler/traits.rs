//! Collaborator traits for the scheduling core.
//!
//! The core never touches storage, catalogs or interpreters directly. Hosts
//! inject implementations of these traits:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Service                              │
//! │                                                              │
//! │  • DataManager   - process / project lookup                  │
//! │  • ProcessLogger - execution records, backpressure signal    │
//! │  • ProcessRunner - the per-service work function             │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  MemoryDataManager, MemoryProcessLogger (adapters module),   │
//! │  host-specific runners (analysis scripts, collectors, ...)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::model::{ExecutionPackage, Process, ProcessId, Project, ProjectId, RegisterId};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Process Logger
// ============================================================================

/// Status of an execution attempt as recorded by the process logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    /// Registered and admitted for execution.
    Start,
    /// Waiting behind an execution of the same process.
    OnQueue,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
    /// Abandoned before finishing.
    Interrupted,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::OnQueue => "on_queue",
            Self::Done => "done",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Kind of a message attached to an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Warning,
    Info,
}

/// Errors reported by a process logger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggerError {
    /// The backing store cannot be reached.
    #[error("process log unavailable: {0}")]
    Unavailable(String),

    /// The register id was never issued by this logger.
    #[error("unknown register id {0}")]
    UnknownRegister(RegisterId),
}

/// Records the start, status and timestamps of each execution attempt.
///
/// Shared by every worker, so implementations must be safe for concurrent
/// use.
pub trait ProcessLogger: Send + Sync {
    /// Registers a new execution attempt for `process_id`.
    fn start(&self, process_id: ProcessId) -> Result<RegisterId, LoggerError>;

    /// Records the status of an execution attempt.
    ///
    /// `data_timestamp` is the timestamp of the newest data produced, if any.
    fn result(
        &self,
        status: ExecutionStatus,
        data_timestamp: Option<DateTime<Utc>>,
        register_id: RegisterId,
    ) -> Result<(), LoggerError>;

    /// Attaches a message to an execution attempt.
    fn log(
        &self,
        kind: MessageKind,
        message: &str,
        register_id: RegisterId,
    ) -> Result<(), LoggerError>;

    /// Completion time of the last successful execution of `process_id`.
    fn last_process_timestamp(
        &self,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>, LoggerError>;

    /// Returns false when the logger cannot record anything (e.g. lost its
    /// storage connection). Workers stop consuming tasks while this is false.
    fn is_valid(&self) -> bool;
}

// ============================================================================
// Data Manager
// ============================================================================

/// Read access to the process catalog.
pub trait DataManager: Send + Sync {
    fn find_process(&self, id: ProcessId) -> Option<Process>;

    fn find_project(&self, id: ProjectId) -> Option<Project>;
}

// ============================================================================
// Process Runner
// ============================================================================

/// Errors raised by a work function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Ran fine but found no data to process. Not a failure.
    #[error("no data available: {0}")]
    NoData(String),

    /// The work itself failed.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The work function panicked.
    #[error("execution panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData(message.into())
    }
}

/// What a successful execution reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Timestamp of the newest data produced.
    pub data_timestamp: Option<DateTime<Utc>>,
    /// Whether processes depending on this one should be triggered.
    pub automatic: bool,
    /// Service specific result values.
    pub payload: Map<String, Value>,
}

impl Default for ExecutionReport {
    fn default() -> Self {
        Self {
            data_timestamp: None,
            automatic: true,
            payload: Map::new(),
        }
    }
}

impl ExecutionReport {
    /// Report for a run that produced data at `timestamp`.
    pub fn with_data(timestamp: DateTime<Utc>) -> Self {
        Self {
            data_timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    /// Report for a run that must not trigger dependents.
    pub fn manual() -> Self {
        Self {
            automatic: false,
            ..Self::default()
        }
    }

    /// Adds a payload value.
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// The per-service work function.
///
/// This is where collection runs, analysis scripts and interpolations
/// execute. Errors and panics raised here are caught at the worker boundary.
pub trait ProcessRunner: Send + Sync {
    /// Service type name for logs ("analysis", "collector", ...).
    fn name(&self) -> &str;

    /// Runs one execution package to completion.
    fn execute(&self, package: &ExecutionPackage) -> Result<ExecutionReport, ExecutionError>;

    /// Erases a previously computed result before it is reprocessed.
    fn erase_previous_result(
        &self,
        _process_id: ProcessId,
        _execution_date: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_defaults_to_automatic() {
        let report = ExecutionReport::default();
        assert!(report.automatic);
        assert!(report.payload.is_empty());
        assert!(!ExecutionReport::manual().automatic);
    }

    #[test]
    fn test_report_payload_builder() {
        let report = ExecutionReport::default()
            .insert("rows", 12)
            .insert("table", "rainfall");
        assert_eq!(report.payload["rows"], Value::from(12));
        assert_eq!(report.payload["table"], Value::from("rainfall"));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::failed("script raised ZeroDivisionError");
        assert!(err.to_string().contains("ZeroDivisionError"));
        assert!(ExecutionError::no_data("empty").to_string().contains("no data"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::OnQueue.to_string(), "on_queue");
        assert_eq!(ExecutionStatus::Done.to_string(), "done");
    }
}
