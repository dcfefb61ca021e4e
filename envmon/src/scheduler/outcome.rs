//! Result of registering a process for scheduling.

use crate::model::ScheduleError;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a process was not scheduled.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The process is flagged inactive.
    Inactive,
    /// The process belongs to another service instance.
    NotOwned,
    /// The owning project cannot be found.
    MissingProject,
    /// The owning project is flagged inactive.
    ProjectInactive,
    /// The schedule cannot produce fire times.
    InvalidSchedule(ScheduleError),
    /// The logger could not provide the last completion time.
    LoggerUnavailable(String),
    /// The timer thread could not be started.
    TimerUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("process inactive"),
            Self::NotOwned => f.write_str("process owned by another instance"),
            Self::MissingProject => f.write_str("project not found"),
            Self::ProjectInactive => f.write_str("project inactive"),
            Self::InvalidSchedule(err) => write!(f, "invalid schedule: {}", err),
            Self::LoggerUnavailable(msg) => write!(f, "logger unavailable: {}", msg),
            Self::TimerUnavailable(msg) => write!(f, "timer unavailable: {}", msg),
        }
    }
}

/// Outcome of `Service::add_process_to_schedule`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// A timer was armed.
    Scheduled { next_fire: DateTime<Utc> },
    /// The process is a reprocessing request and its executions were queued.
    Backfilled { executions: usize },
    /// The process was left unscheduled.
    Skipped(SkipReason),
}

impl ScheduleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Next fire time, if a timer was armed.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Scheduled { next_fire } => Some(*next_fire),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::InvalidSchedule(ScheduleError::InvalidFrequency);
        assert!(reason.to_string().starts_with("invalid schedule"));
        assert_eq!(SkipReason::NotOwned.to_string(), "process owned by another instance");
    }

    #[test]
    fn test_outcome_accessors() {
        let now = Utc::now();
        assert_eq!(
            ScheduleOutcome::Scheduled { next_fire: now }.next_fire(),
            Some(now)
        );
        assert!(ScheduleOutcome::Skipped(SkipReason::Inactive).is_skipped());
        assert!(!ScheduleOutcome::Backfilled { executions: 3 }.is_skipped());
    }
}
