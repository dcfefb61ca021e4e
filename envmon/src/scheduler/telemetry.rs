//! Service events.
//!
//! The scheduling core emits structured events through an [`EventSink`] and
//! never decides how they are presented. The host's control-protocol layer
//! listens for [`ServiceEvent::ProcessFinished`] to answer remote callers;
//! logs, dashboards and tests consume the rest.
//!
//! # Example
//!
//! ```ignore
//! use envmon::scheduler::{EventSink, ServiceEvent};
//!
//! struct AnswerSink;
//!
//! impl EventSink for AnswerSink {
//!     fn emit(&self, event: ServiceEvent) {
//!         if let ServiceEvent::ProcessFinished(result) = event {
//!             println!("{}", result.to_json());
//!         }
//!     }
//! }
//! ```

use super::outcome::SkipReason;
use crate::model::{ProcessId, RegisterId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Completion
// =============================================================================

/// Outcome of one execution, as reported to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessResult {
    pub process_id: ProcessId,
    pub register_id: RegisterId,
    pub execution_date: DateTime<Utc>,
    pub success: bool,
    /// Whether dependent processes should be triggered.
    pub automatic: bool,
    pub duration: Duration,
    /// Service specific values returned by the work function.
    pub payload: Map<String, Value>,
    /// Error description for failed executions.
    pub error: Option<String>,
}

impl ProcessResult {
    /// Renders the answer sent back over the control protocol.
    ///
    /// Payload values come first so the fixed tags always win.
    pub fn to_json(&self) -> Value {
        let mut answer = self.payload.clone();
        answer.insert("process_id".into(), Value::from(self.process_id.get()));
        answer.insert("result".into(), Value::from(self.success));
        answer.insert("automatic".into(), Value::from(self.automatic));
        answer.insert(
            "execution_date".into(),
            Value::from(
                self.execution_date
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        );
        if let Some(error) = &self.error {
            answer.insert("error".into(), Value::from(error.as_str()));
        }
        Value::Object(answer)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events emitted by the scheduling core.
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    ServiceStarted { workers: usize },

    /// The service stopped without `hold_signal`.
    ServiceFinished,

    ThreadsUpdated { previous: usize, current: usize },

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------
    ProcessScheduled {
        process_id: ProcessId,
        next_fire: DateTime<Utc>,
    },

    ProcessSkipped {
        process_id: ProcessId,
        reason: SkipReason,
    },

    ProcessRemoved {
        process_id: ProcessId,
        dropped_packages: usize,
    },

    TimerFired {
        process_id: ProcessId,
        fired_at: DateTime<Utc>,
    },

    // -------------------------------------------------------------------------
    // Admission
    // -------------------------------------------------------------------------
    PackageAdmitted {
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
        queue_depth: usize,
    },

    PackageDeferred {
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
        waiting: usize,
    },

    ReprocessingQueued {
        process_id: ProcessId,
        executions: usize,
    },

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------
    TaskStarted {
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
        worker: usize,
    },

    ProcessFinished(ProcessResult),
}

impl ServiceEvent {
    /// Returns the process this event concerns, if any.
    pub fn process_id(&self) -> Option<ProcessId> {
        match self {
            Self::ProcessScheduled { process_id, .. }
            | Self::ProcessSkipped { process_id, .. }
            | Self::ProcessRemoved { process_id, .. }
            | Self::TimerFired { process_id, .. }
            | Self::PackageAdmitted { process_id, .. }
            | Self::PackageDeferred { process_id, .. }
            | Self::ReprocessingQueued { process_id, .. }
            | Self::TaskStarted { process_id, .. } => Some(*process_id),
            Self::ProcessFinished(result) => Some(result.process_id),
            Self::ServiceStarted { .. } | Self::ServiceFinished | Self::ThreadsUpdated { .. } => {
                None
            }
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceFinished => "service_finished",
            Self::ThreadsUpdated { .. } => "threads_updated",
            Self::ProcessScheduled { .. } => "process_scheduled",
            Self::ProcessSkipped { .. } => "process_skipped",
            Self::ProcessRemoved { .. } => "process_removed",
            Self::TimerFired { .. } => "timer_fired",
            Self::PackageAdmitted { .. } => "package_admitted",
            Self::PackageDeferred { .. } => "package_deferred",
            Self::ReprocessingQueued { .. } => "reprocessing_queued",
            Self::TaskStarted { .. } => "task_started",
            Self::ProcessFinished(_) => "process_finished",
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receiver of service events.
///
/// Events are emitted from the main loop, workers and timer threads, so
/// implementations must be thread-safe and should return quickly.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ServiceEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: ServiceEvent) {}
}

/// Logs events with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ServiceEvent) {
        match &event {
            ServiceEvent::ServiceStarted { workers } => {
                tracing::info!(workers, "Service started");
            }
            ServiceEvent::ServiceFinished => {
                tracing::info!("Service finished");
            }
            ServiceEvent::ThreadsUpdated { previous, current } => {
                tracing::info!(previous, current, "Worker pool resized");
            }
            ServiceEvent::ProcessScheduled {
                process_id,
                next_fire,
            } => {
                tracing::debug!(
                    process_id = %process_id,
                    next_fire = %next_fire,
                    "Process scheduled"
                );
            }
            ServiceEvent::ProcessSkipped { process_id, reason } => {
                tracing::warn!(process_id = %process_id, reason = %reason, "Process skipped");
            }
            ServiceEvent::ProcessRemoved {
                process_id,
                dropped_packages,
            } => {
                tracing::debug!(
                    process_id = %process_id,
                    dropped = dropped_packages,
                    "Process removed"
                );
            }
            ServiceEvent::TimerFired {
                process_id,
                fired_at,
            } => {
                tracing::trace!(process_id = %process_id, fired_at = %fired_at, "Timer fired");
            }
            ServiceEvent::PackageAdmitted {
                process_id,
                execution_date,
                queue_depth,
            } => {
                tracing::trace!(
                    process_id = %process_id,
                    execution_date = %execution_date,
                    queue_depth = queue_depth,
                    "Package admitted"
                );
            }
            ServiceEvent::PackageDeferred {
                process_id,
                execution_date,
                waiting,
            } => {
                tracing::debug!(
                    process_id = %process_id,
                    execution_date = %execution_date,
                    waiting = waiting,
                    "Package deferred behind running execution"
                );
            }
            ServiceEvent::ReprocessingQueued {
                process_id,
                executions,
            } => {
                tracing::info!(
                    process_id = %process_id,
                    executions = executions,
                    "Reprocessing queued"
                );
            }
            ServiceEvent::TaskStarted {
                process_id,
                execution_date,
                worker,
            } => {
                tracing::debug!(
                    process_id = %process_id,
                    execution_date = %execution_date,
                    worker = worker,
                    "Task started"
                );
            }
            ServiceEvent::ProcessFinished(result) => {
                if result.success {
                    tracing::info!(
                        process_id = %result.process_id,
                        execution_date = %result.execution_date,
                        duration_ms = result.duration.as_millis(),
                        automatic = result.automatic,
                        "Process finished"
                    );
                } else {
                    tracing::warn!(
                        process_id = %result.process_id,
                        execution_date = %result.execution_date,
                        duration_ms = result.duration.as_millis(),
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Process failed"
                    );
                }
            }
        }
    }
}

/// Forwards events over a standard channel.
///
/// Send errors (receiver dropped) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: Sender<ServiceEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: Sender<ServiceEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ServiceEvent) {
        let _ = self.sender.send(event);
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiplexEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for MultiplexEventSink {
    fn emit(&self, event: ServiceEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexEventSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}
