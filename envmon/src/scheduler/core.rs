//! Scheduling core - main struct and shared state.
//!
//! This module contains the [`Service`] struct and the state shared by its
//! threads. Behaviour is implemented in separate modules:
//! - `lifecycle`: start, stop, resize, main loop and worker loop
//! - `admission`: enqueueing, wait-queue release, timers, backfill
//! - `dispatch`: task preparation and execution

use super::config::ServiceConfig;
use super::dispatch::panic_message;
use super::queue::ExecutionQueues;
use super::signal::StopSignal;
use super::telemetry::{EventSink, NullEventSink, ServiceEvent};
use super::timer::Timer;
use super::traits::{DataManager, ProcessLogger, ProcessRunner};
use crate::model::{ExecutionPackage, ProcessId};
use crate::time::unix_millis;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::error;

// =============================================================================
// Status
// =============================================================================

/// Lifecycle phase of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServicePhase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub phase: ServicePhase,
    /// Worker threads currently alive.
    pub workers: usize,
    /// Packages in the admission queue.
    pub pending: usize,
    /// Processes with an admitted, unfinished execution.
    pub in_flight: usize,
    /// Packages parked across all wait queues.
    pub waiting: usize,
    /// Prepared tasks not yet picked up by a worker.
    pub queued_tasks: usize,
    /// Armed process timers.
    pub timers: usize,
}

// =============================================================================
// Shared State
// =============================================================================

/// A unit of work ready for a worker.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) package: ExecutionPackage,
    pub(crate) prepared_at: Instant,
}

/// Everything guarded by the queue mutex.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) queues: ExecutionQueues,
    pub(crate) tasks: VecDeque<Task>,
    pub(crate) stopping: bool,
}

impl QueueState {
    /// Work accepted but not yet started.
    pub(crate) fn backlog(&self) -> usize {
        self.queues.pending_len() + self.tasks.len() + self.queues.waiting_len()
    }
}

/// An armed timer and the generation it was created with.
pub(crate) struct ArmedTimer {
    pub(crate) generation: u64,
    pub(crate) timer: Timer,
}

/// State shared by the public handle, the main loop, workers and timers.
pub(crate) struct Shared {
    pub(crate) state: Mutex<QueueState>,

    /// Woken when the admission queue gains a package or on stop.
    pub(crate) main_loop_cv: Condvar,

    /// Woken when tasks are prepared, the logger changes, or on stop.
    pub(crate) worker_cv: Condvar,

    pub(crate) logger: RwLock<Option<Arc<dyn ProcessLogger>>>,
    pub(crate) data_manager: Arc<dyn DataManager>,
    pub(crate) runner: Arc<dyn ProcessRunner>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) config: ServiceConfig,

    pub(crate) timers: Mutex<HashMap<ProcessId, ArmedTimer>>,
    pub(crate) timer_generation: AtomicU64,

    pub(crate) phase: Mutex<ServicePhase>,
    pub(crate) workers: AtomicUsize,

    /// Last activity timestamp (milliseconds since UNIX epoch).
    pub(crate) last_activity_ms: Arc<AtomicU64>,

    /// Accepted work not yet started, mirrored for the watchdog.
    pub(crate) pending_work: Arc<AtomicU64>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_timers(&self) -> MutexGuard<'_, HashMap<ProcessId, ArmedTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn logger(&self) -> Option<Arc<dyn ProcessLogger>> {
        self.logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A missing logger counts as invalid.
    pub(crate) fn logger_is_valid(&self) -> bool {
        self.logger().is_some_and(|logger| logger.is_valid())
    }

    pub(crate) fn phase(&self) -> ServicePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_phase(&self, phase: ServicePhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// Hands `event` to the sink. A panicking sink is logged and ignored so
    /// it can never take a worker, timer or the main loop down with it.
    pub(crate) fn emit(&self, event: ServiceEvent) {
        let event_type = event.event_type();
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| self.events.emit(event)));
        if let Err(payload) = delivered {
            error!(
                event = event_type,
                error = %panic_message(payload.as_ref()),
                "Event sink panicked"
            );
        }
    }

    pub(crate) fn touch_activity(&self) {
        self.last_activity_ms.store(unix_millis(), Ordering::Relaxed);
    }

    /// Mirrors the backlog into the watchdog gauge. Call with the lock held.
    pub(crate) fn refresh_backlog(&self, state: &QueueState) {
        self.pending_work
            .store(state.backlog() as u64, Ordering::Relaxed);
    }
}

// =============================================================================
// Service
// =============================================================================

/// Thread handles owned by whoever currently drives the lifecycle.
#[derive(Default)]
pub(crate) struct Lifecycle {
    pub(crate) main_loop: Option<JoinHandle<()>>,
    pub(crate) workers: Vec<JoinHandle<()>>,
    pub(crate) watchdog: Option<(JoinHandle<()>, Arc<StopSignal>)>,
}

impl Lifecycle {
    pub(crate) fn is_running(&self) -> bool {
        self.main_loop.is_some()
    }
}

/// The process scheduling and execution-queueing engine.
///
/// One `Service` runs per long-lived host service (collector, analysis,
/// interpolation, ...):
/// - Timers fire per scheduled process and enqueue execution packages
/// - A single main loop turns admitted packages into tasks
/// - A fixed-size worker pool runs tasks through the [`ProcessRunner`]
/// - At most one execution per process is ever in flight; later requests
///   wait in a per-process FIFO
///
/// Queued work lives in memory owned by the service, so it survives
/// `stop`/`start` cycles and pool resizes.
pub struct Service {
    pub(crate) shared: Arc<Shared>,
    pub(crate) lifecycle: Mutex<Lifecycle>,
}

impl Service {
    /// Creates a stopped service that discards its events.
    pub fn new(
        config: ServiceConfig,
        data_manager: Arc<dyn DataManager>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self::with_event_sink(config, data_manager, runner, Arc::new(NullEventSink))
    }

    /// Creates a stopped service that reports to `events`.
    pub fn with_event_sink(
        config: ServiceConfig,
        data_manager: Arc<dyn DataManager>,
        runner: Arc<dyn ProcessRunner>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let shared = Shared {
            state: Mutex::new(QueueState::default()),
            main_loop_cv: Condvar::new(),
            worker_cv: Condvar::new(),
            logger: RwLock::new(None),
            data_manager,
            runner,
            events,
            config,
            timers: Mutex::new(HashMap::new()),
            timer_generation: AtomicU64::new(0),
            phase: Mutex::new(ServicePhase::Stopped),
            workers: AtomicUsize::new(0),
            last_activity_ms: Arc::new(AtomicU64::new(unix_millis())),
            pending_work: Arc::new(AtomicU64::new(0)),
        };

        Self {
            shared: Arc::new(shared),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Installs the process logger and wakes workers waiting on it.
    pub fn set_logger(&self, logger: Arc<dyn ProcessLogger>) {
        *self
            .shared
            .logger
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(logger);
        let _state = self.shared.lock_state();
        self.shared.worker_cv.notify_all();
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.shared.config
    }

    pub fn is_running(&self) -> bool {
        self.shared.phase() == ServicePhase::Running
    }

    /// Returns a snapshot of queue depths and pool size.
    pub fn status(&self) -> ServiceStatus {
        let timers = self.shared.lock_timers().len();
        let state = self.shared.lock_state();
        ServiceStatus {
            phase: self.shared.phase(),
            workers: self.shared.workers.load(Ordering::Relaxed),
            pending: state.queues.pending_len(),
            in_flight: state.queues.in_flight_len(),
            waiting: state.queues.waiting_len(),
            queued_tasks: state.tasks.len(),
            timers,
        }
    }

    pub(crate) fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.shared.lock_timers().clear();
        self.stop(true);
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("instance_id", &self.shared.config.instance_id)
            .field("runner", &self.shared.runner.name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryDataManager, MemoryProcessLogger};
    use crate::scheduler::traits::{ExecutionError, ExecutionReport};

    struct IdleRunner;

    impl ProcessRunner for IdleRunner {
        fn name(&self) -> &str {
            "idle"
        }

        fn execute(&self, _package: &ExecutionPackage) -> Result<ExecutionReport, ExecutionError> {
            Ok(ExecutionReport::default())
        }
    }

    fn service() -> Service {
        Service::new(
            ServiceConfig::default(),
            Arc::new(MemoryDataManager::new()),
            Arc::new(IdleRunner),
        )
    }

    #[test]
    fn test_new_service_is_stopped_and_empty() {
        let status = service().status();
        assert_eq!(status.phase, ServicePhase::Stopped);
        assert_eq!(status.workers, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.timers, 0);
    }

    #[test]
    fn test_missing_logger_is_invalid() {
        let service = service();
        assert!(!service.shared.logger_is_valid());

        let logger = Arc::new(MemoryProcessLogger::new());
        service.set_logger(logger.clone());
        assert!(service.shared.logger_is_valid());

        logger.set_valid(false);
        assert!(!service.shared.logger_is_valid());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ServicePhase::Running.to_string(), "running");
        assert_eq!(ServicePhase::default(), ServicePhase::Stopped);
    }

    #[test]
    fn test_debug_includes_runner() {
        assert!(format!("{:?}", service()).contains("idle"));
    }

    struct ExplodingSink;

    impl EventSink for ExplodingSink {
        fn emit(&self, _event: ServiceEvent) {
            panic!("listener crashed");
        }
    }

    #[test]
    fn test_emit_contains_sink_panic() {
        let service = Service::with_event_sink(
            ServiceConfig::default(),
            Arc::new(MemoryDataManager::new()),
            Arc::new(IdleRunner),
            Arc::new(ExplodingSink),
        );
        service.shared.emit(ServiceEvent::ServiceFinished);
        assert_eq!(service.status().phase, ServicePhase::Stopped);
    }

    #[test]
    fn test_stop_without_threads_resets_phase() {
        // State left behind when the main loop thread cannot be spawned.
        let service = service();
        service.shared.set_phase(ServicePhase::Starting);

        service.stop(true);
        assert_eq!(service.status().phase, ServicePhase::Stopped);
        assert!(!service.is_running());
    }
}
