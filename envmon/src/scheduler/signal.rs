//! Blocking stop flag shared between a background thread and its owner.

use crate::time::duration_until;
use chrono::{DateTime, Utc};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A one-way flag that sleeping threads can be woken on.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raises the flag and wakes every waiter.
    pub(crate) fn stop(&self) {
        *self.lock() = true;
        self.condvar.notify_all();
    }

    pub(crate) fn is_stopped(&self) -> bool {
        *self.lock()
    }

    /// Sleeps for `timeout` unless stopped first. Returns true if stopped.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.lock();
        loop {
            if *stopped {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            stopped = match self.condvar.wait_timeout(stopped, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Sleeps until the wall-clock `deadline` unless stopped first.
    /// Returns true if stopped.
    pub(crate) fn wait_until(&self, deadline: DateTime<Utc>) -> bool {
        let mut stopped = self.lock();
        loop {
            if *stopped {
                return true;
            }
            let remaining = duration_until(deadline, Utc::now());
            if remaining.is_zero() {
                return false;
            }
            stopped = match self.condvar.wait_timeout(stopped, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}
