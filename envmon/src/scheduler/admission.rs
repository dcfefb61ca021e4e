//! Admission, wait queues, timers and backfill.
//!
//! This module handles how execution requests enter the service:
//! - `add_to_queue`: admit or defer a package for one process
//! - `notify_wait_queue`: release a process and admit its next package
//! - `add_reprocessing_to_queue`: expand a reprocessing window into packages
//! - `add_process_to_schedule`: validate a process and arm its timer
//!
//! Timer callbacks, worker completions and public calls all go through the
//! same methods on [`Shared`], so they observe one queue mutex.

use super::core::{ArmedTimer, Shared};
use super::outcome::{ScheduleOutcome, SkipReason};
use super::queue::Admission;
use super::telemetry::ServiceEvent;
use super::timer::{Timer, TimerError};
use super::traits::{ExecutionStatus, LoggerError};
use super::Service;
use crate::model::{ExecutionPackage, Process, ProcessId, RegisterId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

// =============================================================================
// Public API
// =============================================================================

impl Service {
    /// Requests an execution of `process` for `execution_date`.
    ///
    /// Never fails: processes owned by another instance are ignored and
    /// logger errors are logged and swallowed.
    pub fn add_to_queue(&self, process: &Process, execution_date: DateTime<Utc>) {
        self.shared.add_to_queue(process, execution_date);
    }

    /// Looks up `process_id` and queues it, routing reprocessing schedules
    /// to [`add_reprocessing_to_queue`](Self::add_reprocessing_to_queue).
    ///
    /// Inactive processes and processes whose project is missing or inactive
    /// are logged and ignored.
    pub fn start_process(&self, process_id: ProcessId, execution_date: DateTime<Utc>) {
        self.shared.start_process(process_id, execution_date);
    }

    /// Queues one execution per date of the process's reprocessing window.
    ///
    /// Returns the number of executions queued; zero when the window is
    /// invalid or the process is not eligible to run here (the reason is
    /// logged).
    pub fn add_reprocessing_to_queue(&self, process: &Process) -> usize {
        self.shared.add_reprocessing_to_queue(process)
    }

    /// Releases `process_id` and admits its next waiting package, if any.
    pub fn notify_wait_queue(&self, process_id: ProcessId) {
        self.shared.notify_wait_queue(process_id);
    }

    /// Registers `process` for scheduling.
    ///
    /// Frequency and fixed-time schedules get a timer. Reprocessing schedules
    /// are queued right away. Processes that cannot run here are skipped.
    pub fn add_process_to_schedule(&self, process: &Process) -> ScheduleOutcome {
        self.shared.add_process_to_schedule(process)
    }

    /// Cancels the timer of `process_id` and drops its queued packages.
    ///
    /// An execution already running is allowed to finish. Returns the number
    /// of packages dropped.
    pub fn remove_process(&self, process_id: ProcessId) -> usize {
        self.shared.remove_process(process_id)
    }

    /// Re-registers a process after its definition changed.
    pub fn update_process(&self, process: &Process) -> ScheduleOutcome {
        self.shared.remove_process(process.id);
        self.shared.add_process_to_schedule(process)
    }
}

// =============================================================================
// Admission
// =============================================================================

impl Shared {
    pub(crate) fn add_to_queue(&self, process: &Process, execution_date: DateTime<Utc>) {
        let process_id = process.id;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_add_to_queue(process, execution_date)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(process_id = %process_id, error = %e, "Failed to queue execution");
            }
            Err(payload) => {
                error!(
                    process_id = %process_id,
                    error = %super::dispatch::panic_message(payload.as_ref()),
                    "Panic while queueing execution"
                );
            }
        }
    }

    fn try_add_to_queue(
        &self,
        process: &Process,
        execution_date: DateTime<Utc>,
    ) -> Result<(), LoggerError> {
        if process.service_instance_id != self.config.instance_id {
            trace!(
                process_id = %process.id,
                owner = %process.service_instance_id,
                "Process owned by another instance, ignoring"
            );
            return Ok(());
        }

        let logger = self
            .logger()
            .ok_or_else(|| LoggerError::Unavailable("no process logger installed".into()))?;
        let register_id = logger.start(process.id)?;
        let package = ExecutionPackage::new(process.id, execution_date, register_id);

        let (admission, queue_depth, waiting) = {
            let mut state = self.lock_state();
            let admission = state.queues.admit(package);
            // Deferred packages are only released under this lock, so the
            // queued status always precedes the worker's statuses.
            if admission == Admission::Deferred {
                if let Err(e) = logger.result(ExecutionStatus::OnQueue, None, register_id) {
                    warn!(process_id = %process.id, error = %e, "Failed to record queued status");
                }
            }
            self.refresh_backlog(&state);
            (
                admission,
                state.queues.pending_len(),
                state.queues.waiting_for(process.id),
            )
        };

        match admission {
            Admission::Admitted => {
                self.main_loop_cv.notify_one();
                self.emit(ServiceEvent::PackageAdmitted {
                    process_id: process.id,
                    execution_date,
                    queue_depth,
                });
            }
            Admission::Deferred => {
                self.emit(ServiceEvent::PackageDeferred {
                    process_id: process.id,
                    execution_date,
                    waiting,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn notify_wait_queue(&self, process_id: ProcessId) {
        let admitted = {
            let mut state = self.lock_state();
            let admitted = state.queues.release(process_id).cloned();
            let depth = state.queues.pending_len();
            self.refresh_backlog(&state);
            admitted.map(|package| (package, depth))
        };

        if let Some((package, queue_depth)) = admitted {
            self.main_loop_cv.notify_one();
            self.emit(ServiceEvent::PackageAdmitted {
                process_id,
                execution_date: package.execution_date,
                queue_depth,
            });
        }
    }

    pub(crate) fn start_process(&self, process_id: ProcessId, execution_date: DateTime<Utc>) {
        let Some(process) = self.data_manager.find_process(process_id) else {
            warn!(process_id = %process_id, "Cannot start unknown process");
            return;
        };
        if let Err(reason) = self.eligibility(&process) {
            warn!(process_id = %process_id, reason = %reason, "Start request rejected");
            return;
        }

        if process.schedule.is_reprocessing() {
            self.add_reprocessing_to_queue(&process);
        } else {
            self.add_to_queue(&process, execution_date);
        }
    }

    // =========================================================================
    // Backfill
    // =========================================================================

    pub(crate) fn add_reprocessing_to_queue(&self, process: &Process) -> usize {
        let queued = self
            .eligibility(process)
            .and_then(|()| self.queue_reprocessing(process));
        match queued {
            Ok(executions) => executions,
            Err(reason) => {
                error!(process_id = %process.id, reason = %reason, "Reprocessing aborted");
                0
            }
        }
    }

    /// Expands the window of an eligible process into packages.
    fn queue_reprocessing(&self, process: &Process) -> Result<usize, SkipReason> {
        let dates = process
            .schedule
            .reprocessing_dates()
            .map_err(SkipReason::InvalidSchedule)?;

        let logger = self
            .logger()
            .ok_or_else(|| SkipReason::LoggerUnavailable("no process logger installed".into()))?;
        let register_id = logger
            .start(process.id)
            .map_err(|e| SkipReason::LoggerUnavailable(e.to_string()))?;

        for date in &dates {
            if let Err(e) = self.runner.erase_previous_result(process.id, *date) {
                warn!(
                    process_id = %process.id,
                    execution_date = %date,
                    error = %e,
                    "Failed to erase previous result"
                );
            }
        }

        let executions = dates.len();
        let admitted = {
            let mut state = self.lock_state();
            for date in dates {
                state
                    .queues
                    .defer(ExecutionPackage::new(process.id, date, register_id));
            }
            let admitted = if state.queues.is_in_flight(process.id) {
                false
            } else {
                state.queues.release(process.id).is_some()
            };
            self.refresh_backlog(&state);
            admitted
        };

        if admitted {
            self.main_loop_cv.notify_one();
        }

        info!(
            process_id = %process.id,
            executions,
            "Reprocessing queued"
        );
        self.emit(ServiceEvent::ReprocessingQueued {
            process_id: process.id,
            executions,
        });
        Ok(executions)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Checks activity, ownership and the owning project.
    fn eligibility(&self, process: &Process) -> Result<(), SkipReason> {
        if !process.active {
            return Err(SkipReason::Inactive);
        }
        if process.service_instance_id != self.config.instance_id {
            return Err(SkipReason::NotOwned);
        }
        match self.data_manager.find_project(process.project_id) {
            None => Err(SkipReason::MissingProject),
            Some(project) if !project.active => Err(SkipReason::ProjectInactive),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn add_process_to_schedule(self: &Arc<Self>, process: &Process) -> ScheduleOutcome {
        if let Err(reason) = self.eligibility(process) {
            return self.skip(process.id, reason);
        }

        if process.schedule.is_reprocessing() {
            return match self.queue_reprocessing(process) {
                Ok(executions) => ScheduleOutcome::Backfilled { executions },
                Err(reason) => self.skip(process.id, reason),
            };
        }

        if let Err(e) = process.schedule.cadence() {
            return self.skip(process.id, SkipReason::InvalidSchedule(e));
        }

        let last_completion = match self.logger() {
            Some(logger) => match logger.last_process_timestamp(process.id) {
                Ok(last) => last,
                Err(e) => return self.skip(process.id, SkipReason::LoggerUnavailable(e.to_string())),
            },
            None => {
                debug!(process_id = %process.id, "No logger, scheduling without history");
                None
            }
        };

        match self.arm_timer(process, last_completion) {
            Ok(next_fire) => {
                debug!(process_id = %process.id, next_fire = %next_fire, "Process scheduled");
                self.emit(ServiceEvent::ProcessScheduled {
                    process_id: process.id,
                    next_fire,
                });
                ScheduleOutcome::Scheduled { next_fire }
            }
            Err(TimerError::InvalidSchedule { source, .. }) => {
                self.skip(process.id, SkipReason::InvalidSchedule(source))
            }
            Err(e @ TimerError::Spawn { .. }) => {
                self.skip(process.id, SkipReason::TimerUnavailable(e.to_string()))
            }
        }
    }

    fn skip(&self, process_id: ProcessId, reason: SkipReason) -> ScheduleOutcome {
        warn!(process_id = %process_id, reason = %reason, "Process not scheduled");
        self.emit(ServiceEvent::ProcessSkipped {
            process_id,
            reason: reason.clone(),
        });
        ScheduleOutcome::Skipped(reason)
    }

    /// Creates a timer for `process`, replacing any previous one.
    fn arm_timer(
        self: &Arc<Self>,
        process: &Process,
        last_completion: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, TimerError> {
        let mut timers = self.lock_timers();
        self.arm_timer_locked(&mut timers, process, last_completion)
    }

    /// Arms a timer with the timer map already locked, so an immediate fire
    /// always finds its own generation.
    fn arm_timer_locked(
        self: &Arc<Self>,
        timers: &mut HashMap<ProcessId, ArmedTimer>,
        process: &Process,
        last_completion: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, TimerError> {
        let process_id = process.id;
        let generation = self.timer_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let weak = Arc::downgrade(self);

        let timer = Timer::start(process, last_completion, move |fired_at| {
            if let Some(shared) = weak.upgrade() {
                shared.on_timer_fired(process_id, generation, fired_at);
            }
        })?;
        let next_fire = timer.fires_at();
        timers.insert(process_id, ArmedTimer { generation, timer });
        Ok(next_fire)
    }

    /// Queues the fired process and arms its next timer.
    fn on_timer_fired(self: &Arc<Self>, process_id: ProcessId, generation: u64, fired_at: DateTime<Utc>) {
        let current = self
            .lock_timers()
            .get(&process_id)
            .is_some_and(|armed| armed.generation == generation);
        if !current {
            trace!(process_id = %process_id, "Ignoring stale timer");
            return;
        }

        self.emit(ServiceEvent::TimerFired {
            process_id,
            fired_at,
        });

        let Some(process) = self.data_manager.find_process(process_id) else {
            warn!(process_id = %process_id, "Scheduled process disappeared, dropping timer");
            self.lock_timers().remove(&process_id);
            return;
        };

        if let Err(reason) = self.eligibility(&process) {
            self.lock_timers().remove(&process_id);
            self.skip(process_id, reason);
            return;
        }

        self.add_to_queue(&process, fired_at);

        // Never re-arm before the fire time, even if the last completion lags.
        let last_completion = self
            .logger()
            .and_then(|logger| logger.last_process_timestamp(process_id).ok().flatten());
        let base = last_completion.map_or(fired_at, |last| last.max(fired_at));

        // Removed or replaced while this fire was being queued.
        let mut timers = self.lock_timers();
        if !timers
            .get(&process_id)
            .is_some_and(|armed| armed.generation == generation)
        {
            trace!(process_id = %process_id, "Timer cancelled while firing, not re-arming");
            return;
        }
        if let Err(e) = self.arm_timer_locked(&mut timers, &process, Some(base)) {
            timers.remove(&process_id);
            error!(process_id = %process_id, error = %e, "Failed to re-arm timer");
        }
    }

    // =========================================================================
    // Removal
    // =========================================================================

    pub(crate) fn remove_process(&self, process_id: ProcessId) -> usize {
        if self.lock_timers().remove(&process_id).is_some() {
            debug!(process_id = %process_id, "Timer cancelled");
        }

        let dropped = {
            let mut state = self.lock_state();
            let mut dropped = state.queues.remove_process(process_id);

            let before = state.tasks.len();
            let mut prepared = Vec::new();
            state.tasks.retain(|task| {
                if task.package.process_id == process_id {
                    prepared.push(task.package.clone());
                    false
                } else {
                    true
                }
            });
            if state.tasks.len() < before {
                state.queues.release(process_id);
            }
            dropped.extend(prepared);
            self.refresh_backlog(&state);
            dropped
        };

        if let Some(logger) = self.logger() {
            let registers: HashSet<RegisterId> = dropped.iter().map(|p| p.register_id).collect();
            for register_id in registers {
                if let Err(e) = logger.result(ExecutionStatus::Interrupted, None, register_id) {
                    warn!(process_id = %process_id, error = %e, "Failed to record interruption");
                }
            }
        }

        info!(process_id = %process_id, dropped = dropped.len(), "Process removed");
        self.emit(ServiceEvent::ProcessRemoved {
            process_id,
            dropped_packages: dropped.len(),
        });
        dropped.len()
    }
}
