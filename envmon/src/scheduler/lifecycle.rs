//! Service lifecycle and thread loops.
//!
//! This module handles:
//! - Starting the main loop, worker pool and watchdog
//! - Stopping and joining them
//! - Resizing the worker pool at runtime
//! - The main dispatch loop and the worker loop themselves

use super::core::{Lifecycle, ServicePhase, Shared};
use super::error::ServiceError;
use super::signal::StopSignal;
use super::telemetry::ServiceEvent;
use super::watchdog::StallWatchdog;
use super::Service;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

impl Service {
    /// Starts the main loop and `threads` workers.
    ///
    /// `0` requests one worker per hardware thread. The count is clamped to
    /// the configured maximum. Returns the number of workers started.
    pub fn start(&self, threads: usize) -> Result<usize, ServiceError> {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.is_running() {
            return Err(ServiceError::AlreadyRunning);
        }
        self.start_locked(&mut lifecycle, threads)
    }

    /// Stops the main loop and every worker, then joins them.
    ///
    /// Running executions finish first; queued work stays in memory. Emits
    /// [`ServiceEvent::ServiceFinished`] unless `hold_signal` is set. Calling
    /// this on a stopped service does nothing.
    pub fn stop(&self, hold_signal: bool) {
        let mut lifecycle = self.lock_lifecycle();
        self.stop_locked(&mut lifecycle, hold_signal);
    }

    /// Cancels every timer, then stops.
    pub fn stop_service(&self) {
        let cancelled = {
            let mut timers = self.shared.lock_timers();
            let count = timers.len();
            timers.clear();
            count
        };
        debug!(timers = cancelled, "Timers cancelled");
        self.stop(false);
    }

    /// Changes the worker pool size.
    ///
    /// - Stopped: same as [`start`](Self::start).
    /// - Growing: extra workers join the running pool.
    /// - Shrinking: the whole pool is stopped (workers finish their current
    ///   execution) and restarted with the new size.
    ///
    /// Returns the resulting worker count.
    pub fn update_number_of_threads(&self, threads: usize) -> Result<usize, ServiceError> {
        let mut lifecycle = self.lock_lifecycle();
        if !lifecycle.is_running() {
            return self.start_locked(&mut lifecycle, threads);
        }

        let target = self.shared.config.effective_threads(threads);
        let current = lifecycle.workers.len();

        if target == current {
            return Ok(current);
        }

        if target < current {
            info!(current, target, "Shrinking worker pool");
            self.stop_locked(&mut lifecycle, true);
            self.start_locked(&mut lifecycle, target)?;
        } else {
            info!(current, target, "Growing worker pool");
            for index in current..target {
                let handle = spawn_worker(&self.shared, index).map_err(|e| {
                    error!(worker = index, error = %e, "Failed to spawn worker");
                    ServiceError::ThreadSpawn(e)
                })?;
                lifecycle.workers.push(handle);
            }
        }

        self.shared.emit(ServiceEvent::ThreadsUpdated {
            previous: current,
            current: lifecycle.workers.len(),
        });
        Ok(lifecycle.workers.len())
    }

    fn start_locked(&self, lifecycle: &mut Lifecycle, threads: usize) -> Result<usize, ServiceError> {
        let threads = self.shared.config.effective_threads(threads);
        self.shared.set_phase(ServicePhase::Starting);
        self.shared.lock_state().stopping = false;
        self.shared.touch_activity();

        if let Err(e) = self.spawn_threads(lifecycle, threads) {
            error!(error = %e, "Failed to start service threads");
            self.stop_locked(lifecycle, true);
            return Err(ServiceError::ThreadSpawn(e));
        }

        self.shared.set_phase(ServicePhase::Running);
        info!(
            workers = threads,
            instance_id = %self.shared.config.instance_id,
            runner = self.shared.runner.name(),
            "Service started"
        );
        self.shared.emit(ServiceEvent::ServiceStarted { workers: threads });
        Ok(threads)
    }

    fn spawn_threads(&self, lifecycle: &mut Lifecycle, threads: usize) -> std::io::Result<()> {
        let shared = Arc::clone(&self.shared);
        let main_loop = thread::Builder::new()
            .name("envmon-main-loop".to_string())
            .spawn(move || run_main_loop(shared))?;
        lifecycle.main_loop = Some(main_loop);

        for index in 0..threads {
            lifecycle.workers.push(spawn_worker(&self.shared, index)?);
        }

        if let Some(interval) = self.shared.config.watchdog_interval {
            let shutdown = Arc::new(StopSignal::new());
            let watchdog = StallWatchdog::new(
                Arc::clone(&self.shared.last_activity_ms),
                Arc::clone(&self.shared.pending_work),
                self.shared.config.stall_threshold,
                interval,
            );
            let handle = watchdog.spawn(Arc::clone(&shutdown))?;
            lifecycle.watchdog = Some((handle, shutdown));
        }
        Ok(())
    }

    fn stop_locked(&self, lifecycle: &mut Lifecycle, hold_signal: bool) {
        if !lifecycle.is_running() && lifecycle.workers.is_empty() {
            // A start that failed before any thread was spawned.
            self.shared.set_phase(ServicePhase::Stopped);
            return;
        }

        self.shared.set_phase(ServicePhase::Stopping);
        {
            let mut state = self.shared.lock_state();
            state.stopping = true;
        }
        self.shared.main_loop_cv.notify_all();
        self.shared.worker_cv.notify_all();

        if let Some(handle) = lifecycle.main_loop.take() {
            join_thread(handle, "main loop");
        }
        for handle in lifecycle.workers.drain(..) {
            join_thread(handle, "worker");
        }
        if let Some((handle, shutdown)) = lifecycle.watchdog.take() {
            shutdown.stop();
            join_thread(handle, "watchdog");
        }

        self.shared.set_phase(ServicePhase::Stopped);
        info!("Service stopped");

        if !hold_signal {
            self.shared.emit(ServiceEvent::ServiceFinished);
        }
    }
}

/// Spawns one worker, counting it as alive until its thread exits.
fn spawn_worker(shared: &Arc<Shared>, index: usize) -> std::io::Result<JoinHandle<()>> {
    let worker_shared = Arc::clone(shared);
    shared.workers.fetch_add(1, Ordering::Relaxed);
    thread::Builder::new()
        .name(format!("envmon-worker-{}", index))
        .spawn(move || run_worker(worker_shared, index))
        .map_err(|e| {
            shared.workers.fetch_sub(1, Ordering::Relaxed);
            e
        })
}

fn join_thread(handle: JoinHandle<()>, role: &str) {
    if let Err(e) = handle.join() {
        warn!("Service {} thread panicked: {:?}", role, e);
    }
}

// =============================================================================
// Main Loop
// =============================================================================

fn run_main_loop(shared: Arc<Shared>) {
    debug!("Main loop started");
    loop {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| drain_admission_queue(&shared)));
        match outcome {
            Ok(true) => continue,
            Ok(false) => break,
            Err(payload) => {
                error!(
                    error = %super::dispatch::panic_message(payload.as_ref()),
                    "Main loop iteration panicked"
                );
            }
        }
    }
    debug!("Main loop stopped");
}

/// One main loop iteration. Returns false once stopping.
fn drain_admission_queue(shared: &Shared) -> bool {
    let state = shared.lock_state();
    let mut state = shared
        .main_loop_cv
        .wait_while(state, |s| !s.stopping && !s.queues.has_pending())
        .unwrap_or_else(PoisonError::into_inner);

    if state.stopping {
        return false;
    }

    let mut prepared = 0;
    while !state.stopping {
        match state.queues.pop_pending() {
            Some(package) => {
                shared.prepare_task(&mut state, package);
                prepared += 1;
            }
            None => break,
        }
    }
    shared.refresh_backlog(&state);
    drop(state);

    if prepared > 0 {
        shared.touch_activity();
        shared.worker_cv.notify_all();
    }
    true
}

// =============================================================================
// Workers
// =============================================================================

/// Decrements the live worker gauge when a worker thread ends, even by
/// unwinding.
struct AliveWorker<'a>(&'a AtomicUsize);

impl Drop for AliveWorker<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

fn run_worker(shared: Arc<Shared>, index: usize) {
    let _alive = AliveWorker(&shared.workers);
    debug!(worker = index, "Worker started");
    while let Some(task) = next_task(&shared, index) {
        shared.execute_task(task, index);
    }
    debug!(worker = index, "Worker stopped");
}

/// Blocks until a task can be executed. Returns `None` once stopping.
///
/// Tasks are left queued while the logger is invalid.
fn next_task(shared: &Shared, index: usize) -> Option<super::core::Task> {
    let mut state = shared.lock_state();
    loop {
        if state.stopping {
            return None;
        }

        if state.tasks.is_empty() {
            state = shared
                .worker_cv
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        }

        if !shared.logger_is_valid() {
            debug!(
                worker = index,
                queued = state.tasks.len(),
                "Logger unavailable, holding tasks"
            );
            state = match shared
                .worker_cv
                .wait_timeout(state, shared.config.logger_retry_interval)
            {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
            continue;
        }

        let task = state.tasks.pop_front();
        shared.refresh_backlog(&state);
        return task;
    }
}
