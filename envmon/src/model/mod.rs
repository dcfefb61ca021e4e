//! Data model shared by the scheduler and its collaborators.
//!
//! These are plain values. The scheduler reads processes and projects from a
//! [`DataManager`](crate::scheduler::DataManager) and never owns their
//! lifecycle.

mod ids;
mod process;
mod schedule;

pub use ids::{ProcessId, ProjectId, RegisterId, ServiceInstanceId};
pub use process::{ExecutionPackage, Process, Project};
pub use schedule::{
    parse_time_of_day, Cadence, ReprocessingWindow, Schedule, ScheduleError, TimeUnit,
};
