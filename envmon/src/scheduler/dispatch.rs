//! Task preparation and execution.
//!
//! The main loop turns admitted packages into [`Task`]s with
//! [`Shared::prepare_task`]; workers run them with [`Shared::execute_task`].
//! Every error and panic raised by the work function is converted into a
//! failed [`ProcessResult`]. Panics from the logger or the event sink are
//! logged, and the process is released in every case.

use super::core::{QueueState, Shared, Task};
use super::telemetry::{ProcessResult, ServiceEvent};
use super::traits::{ExecutionError, ExecutionReport, ExecutionStatus, MessageKind};
use crate::model::ExecutionPackage;
use serde_json::Map;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

impl Shared {
    /// Queues `package` for the worker pool. Call with the queue lock held.
    pub(crate) fn prepare_task(&self, state: &mut QueueState, package: ExecutionPackage) {
        trace!(
            process_id = %package.process_id,
            execution_date = %package.execution_date,
            queued_tasks = state.tasks.len(),
            "Task prepared"
        );
        state.tasks.push_back(Task {
            package,
            prepared_at: Instant::now(),
        });
    }

    /// Runs one task to completion on the calling worker.
    ///
    /// Records the outcome with the logger, reports it to listeners, then
    /// releases the process so its next waiting package can be admitted.
    pub(crate) fn execute_task(&self, task: Task, worker: usize) {
        let package = task.package;
        self.touch_activity();

        debug!(
            worker,
            process_id = %package.process_id,
            execution_date = %package.execution_date,
            queue_wait_ms = task.prepared_at.elapsed().as_millis(),
            "Executing task"
        );
        self.emit(ServiceEvent::TaskStarted {
            process_id: package.process_id,
            execution_date: package.execution_date,
            worker,
        });

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.runner.execute(&package)))
            .unwrap_or_else(|payload| {
                Err(ExecutionError::Panicked(panic_message(payload.as_ref())))
            });
        let result = self.record_outcome(&package, outcome, started.elapsed());

        self.emit(ServiceEvent::ProcessFinished(result));
        self.notify_wait_queue(package.process_id);
        self.touch_activity();
    }

    /// Writes the outcome to the process logger and builds the completion.
    fn record_outcome(
        &self,
        package: &ExecutionPackage,
        outcome: Result<ExecutionReport, ExecutionError>,
        duration: Duration,
    ) -> ProcessResult {
        let mut result = ProcessResult {
            process_id: package.process_id,
            register_id: package.register_id,
            execution_date: package.execution_date,
            success: true,
            automatic: true,
            duration,
            payload: Map::new(),
            error: None,
        };

        let (status, data_timestamp, message) = match outcome {
            Ok(report) => {
                result.automatic = report.automatic;
                result.payload = report.payload;
                (ExecutionStatus::Done, report.data_timestamp, None)
            }
            Err(ExecutionError::NoData(reason)) => {
                result.automatic = false;
                (
                    ExecutionStatus::Done,
                    None,
                    Some((MessageKind::Warning, reason)),
                )
            }
            Err(err) => {
                warn!(
                    process_id = %package.process_id,
                    execution_date = %package.execution_date,
                    error = %err,
                    "Execution failed"
                );
                result.success = false;
                result.automatic = false;
                result.error = Some(err.to_string());
                (
                    ExecutionStatus::Error,
                    None,
                    Some((MessageKind::Error, err.to_string())),
                )
            }
        };

        let Some(logger) = self.logger() else {
            warn!(process_id = %package.process_id, "No process logger, result not recorded");
            return result;
        };

        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some((kind, text)) = message {
                if let Err(e) = logger.log(kind, &text, package.register_id) {
                    warn!(process_id = %package.process_id, error = %e, "Failed to log execution message");
                }
            }
            if let Err(e) = logger.result(status, data_timestamp, package.register_id) {
                warn!(process_id = %package.process_id, error = %e, "Failed to record execution result");
            }
        }));
        if let Err(payload) = recorded {
            error!(
                process_id = %package.process_id,
                error = %panic_message(payload.as_ref()),
                "Process logger panicked while recording result"
            );
        }
        result
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
