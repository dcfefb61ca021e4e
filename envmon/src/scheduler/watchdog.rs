//! Stall detection watchdog.
//!
//! Monitors service health by tracking activity timestamps and warning
//! when the service appears stalled (pending work but no progress).

use super::signal::StopSignal;
use crate::time::unix_millis;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Health verdict of one watchdog check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Recent activity.
    Healthy,
    /// No recent activity and nothing to do.
    Idle,
    /// Work is pending but nothing progressed for longer than the threshold.
    Stalled,
}

/// Stall detection watchdog for the service.
pub struct StallWatchdog {
    /// Shared timestamp of last dispatch or worker activity.
    last_activity_ms: Arc<AtomicU64>,

    /// Shared count of packages and tasks not yet started.
    pending_work: Arc<AtomicU64>,

    threshold: Duration,

    interval: Duration,
}

impl StallWatchdog {
    pub fn new(
        last_activity_ms: Arc<AtomicU64>,
        pending_work: Arc<AtomicU64>,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            last_activity_ms,
            pending_work,
            threshold,
            interval,
        }
    }

    /// Runs the watchdog on its own thread until `shutdown` is raised.
    pub(crate) fn spawn(self, shutdown: Arc<StopSignal>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("envmon-watchdog".to_string())
            .spawn(move || {
                while !shutdown.wait_timeout(self.interval) {
                    self.check_health();
                }
                debug!("Stall watchdog stopped");
            })
    }

    /// Checks service health and logs appropriate message.
    pub fn check_health(&self) -> Health {
        let elapsed_ms = self.elapsed_since_last_activity();
        let work_count = self.pending_work.load(Ordering::Relaxed);
        let threshold_ms = self.threshold.as_millis() as u64;

        match (elapsed_ms > threshold_ms, work_count > 0) {
            (true, true) => {
                warn!(
                    elapsed_ms,
                    pending_work = work_count,
                    threshold_ms,
                    "STALL DETECTED: {} executions pending but no progress for {}s",
                    work_count,
                    elapsed_ms / 1000
                );
                Health::Stalled
            }
            (true, false) => {
                debug!(elapsed_ms, "Stall watchdog: service idle (no pending work)");
                Health::Idle
            }
            (false, _) => {
                debug!(
                    elapsed_ms,
                    pending_work = work_count,
                    "Stall watchdog: service healthy"
                );
                Health::Healthy
            }
        }
    }

    fn elapsed_since_last_activity(&self) -> u64 {
        unix_millis().saturating_sub(self.last_activity_ms.load(Ordering::Relaxed))
    }
}
