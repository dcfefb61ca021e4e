//! Process scheduling and execution-queueing core.
//!
//! Every long-running envmon service (collector, analysis, interpolation,
//! view) embeds one [`Service`]. It fires per-process timers, admits
//! execution requests with at most one in flight per process, and runs them
//! on a resizable worker pool.
//!
//! # Architecture
//!
//! ```text
//! Timer fire / start_process / backfill
//!        │
//!        ▼
//! ┌───────────────┐  in flight?  ┌──────────────────────────┐
//! │ add_to_queue  │─────yes─────►│ wait queue (per process) │
//! └──────┬────────┘              └────────────▲─────────────┘
//!        │ no                                 │ release
//!        ▼                                    │
//! ┌───────────────┐   main loop   ┌───────────┴──┐
//! │ admission     │──────────────►│ task queue   │──► workers ──► runner
//! │ queue (FIFO)  │  prepare_task └──────────────┘       │
//! └───────────────┘                                      ▼
//!                                     logger result, ProcessFinished,
//!                                     notify_wait_queue
//! ```
//!
//! All queues, the in-flight set and the stop flag share one mutex. The
//! host supplies the collaborators: a [`DataManager`] for process lookup, a
//! [`ProcessLogger`] for execution records and a [`ProcessRunner`] holding
//! the actual work.
//!
//! # Example
//!
//! ```ignore
//! use envmon::scheduler::{Service, ServiceConfig};
//!
//! let service = Service::new(ServiceConfig::default(), data_manager, runner);
//! service.set_logger(logger);
//! service.start(0)?;
//! for process in catalog {
//!     service.add_process_to_schedule(&process);
//! }
//! // ...
//! service.stop_service();
//! ```

mod admission;
mod config;
mod core;
mod dispatch;
mod error;
mod lifecycle;
mod outcome;
mod queue;
mod signal;
mod telemetry;
mod timer;
mod traits;
mod watchdog;

pub use config::ServiceConfig;
pub use self::core::{Service, ServicePhase, ServiceStatus};
pub use error::ServiceError;
pub use outcome::{ScheduleOutcome, SkipReason};
pub use queue::{Admission, ExecutionQueues};
pub use telemetry::{
    ChannelEventSink, EventSink, MultiplexEventSink, NullEventSink, ProcessResult, ServiceEvent,
    TracingEventSink,
};
pub use timer::{next_fire, Timer, TimerError};
pub use traits::{
    DataManager, ExecutionError, ExecutionReport, ExecutionStatus, LoggerError, MessageKind,
    ProcessLogger, ProcessRunner,
};
pub use watchdog::{Health, StallWatchdog};
