//! One-shot process timers.
//!
//! A [`Timer`] waits on its own thread until the next fire time computed from
//! a process's schedule and last completion, then hands the fire timestamp to
//! its callback exactly once. Timers do not re-arm themselves: the service
//! creates a fresh timer after each fire.
//!
//! Cancelling a timer never joins its thread, so a callback may safely replace
//! or cancel the timer that invoked it.

use super::signal::StopSignal;
use crate::model::{Cadence, Process, ProcessId, Schedule, ScheduleError};
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::trace;

/// Errors raised while creating a timer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The process schedule cannot produce a fire time.
    #[error("invalid schedule for process {process_id}: {source}")]
    InvalidSchedule {
        process_id: ProcessId,
        #[source]
        source: ScheduleError,
    },

    /// The timer thread could not be created.
    #[error("failed to spawn timer thread for process {process_id}: {source}")]
    Spawn {
        process_id: ProcessId,
        #[source]
        source: io::Error,
    },
}

/// Computes the next fire time of `schedule`.
///
/// - Frequency schedules fire `frequency` after the last completion, or
///   `now` when there is none. A fire time already in the past collapses
///   to `now`.
/// - Fixed-time schedules fire at the next occurrence strictly after `now`.
pub fn next_fire(
    schedule: &Schedule,
    last_completion: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    match schedule.cadence()? {
        Cadence::Every(interval) => match last_completion {
            Some(last) => {
                let next = last
                    .checked_add_signed(interval)
                    .ok_or(ScheduleError::InvalidFrequency)?;
                Ok(next.max(now))
            }
            None => Ok(now),
        },
        Cadence::At { time, weekday } => Ok(next_occurrence(now, time, weekday)),
    }
}

fn next_occurrence(now: DateTime<Utc>, time: NaiveTime, weekday: Option<Weekday>) -> DateTime<Utc> {
    let mut date = now.date_naive();
    loop {
        let candidate = date.and_time(time).and_utc();
        let day_matches = weekday.map_or(true, |day| date.weekday() == day);
        if candidate > now && day_matches {
            return candidate;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => return candidate,
        }
    }
}

/// A live countdown for one process.
pub struct Timer {
    process_id: ProcessId,
    fires_at: DateTime<Utc>,
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

impl Timer {
    /// Arms a timer for `process`.
    ///
    /// Fails synchronously if the schedule is malformed; the caller decides
    /// whether to skip the process.
    pub fn start<F>(
        process: &Process,
        last_completion: Option<DateTime<Utc>>,
        on_fire: F,
    ) -> Result<Self, TimerError>
    where
        F: FnOnce(DateTime<Utc>) + Send + 'static,
    {
        let process_id = process.id;
        let fires_at = next_fire(&process.schedule, last_completion, Utc::now())
            .map_err(|source| TimerError::InvalidSchedule { process_id, source })?;

        let signal = Arc::new(StopSignal::new());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(format!("envmon-timer-{}", process_id))
            .spawn(move || {
                if !thread_signal.wait_until(fires_at) {
                    trace!(process_id = %process_id, fires_at = %fires_at, "Timer fired");
                    on_fire(fires_at);
                }
            })
            .map_err(|source| TimerError::Spawn { process_id, source })?;

        Ok(Self {
            process_id,
            fires_at,
            signal,
            handle,
        })
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    /// Timestamp this timer fires (or fired) at.
    pub fn fires_at(&self) -> DateTime<Utc> {
        self.fires_at
    }

    /// Prevents the timer from firing if it has not fired yet.
    pub fn cancel(&self) {
        self.signal.stop();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Returns true once the timer thread has exited (fired or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("process_id", &self.process_id)
            .field("fires_at", &self.fires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectId, ServiceInstanceId, TimeUnit};
    use chrono::{TimeDelta, TimeZone};
    use std::sync::mpsc;
    use std::time::Duration;

    fn noon() -> DateTime<Utc> {
        // 2024-05-01 is a Wednesday
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn process(schedule: Schedule) -> Process {
        Process::new(
            ProcessId::new(1),
            ProjectId::new(1),
            ServiceInstanceId::new(1),
            schedule,
        )
    }

    #[test]
    fn test_frequency_without_history_fires_now() {
        let schedule = Schedule::every(10, TimeUnit::Minute);
        assert_eq!(next_fire(&schedule, None, noon()).unwrap(), noon());
    }

    #[test]
    fn test_frequency_fires_after_last_completion() {
        let schedule = Schedule::every(10, TimeUnit::Minute);
        let last = noon() - TimeDelta::minutes(4);
        assert_eq!(
            next_fire(&schedule, Some(last), noon()).unwrap(),
            noon() + TimeDelta::minutes(6)
        );
    }

    #[test]
    fn test_overdue_frequency_collapses_to_now() {
        let schedule = Schedule::every(10, TimeUnit::Minute);
        let last = noon() - TimeDelta::hours(3);
        assert_eq!(next_fire(&schedule, Some(last), noon()).unwrap(), noon());
    }

    #[test]
    fn test_daily_schedule_later_today() {
        let schedule = Schedule::daily_at(NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(
            next_fire(&schedule, None, noon()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_schedule_is_strictly_after_now() {
        let schedule = Schedule::daily_at(NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(
            next_fire(&schedule, None, noon()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_schedule_finds_next_weekday() {
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let monday = Schedule::weekly_at(Weekday::Mon, time);
        assert_eq!(
            next_fire(&monday, None, noon()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
        );

        let wednesday_morning = Schedule::weekly_at(Weekday::Wed, time);
        assert_eq!(
            next_fire(&wednesday_morning, None, noon()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 8, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_fixed_schedule_ignores_last_completion() {
        let schedule = Schedule::daily_at(NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        let last = noon() - TimeDelta::days(10);
        assert_eq!(
            next_fire(&schedule, Some(last), noon()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_malformed_schedule_fails_construction() {
        let result = Timer::start(&process(Schedule::default()), None, |_| {});
        assert!(matches!(
            result,
            Err(TimerError::InvalidSchedule {
                source: ScheduleError::InvalidFrequency,
                ..
            })
        ));
    }

    #[test]
    fn test_timer_fires_once_with_fire_time() {
        let (tx, rx) = mpsc::channel();
        let timer = Timer::start(&process(Schedule::every(1, TimeUnit::Hour)), None, move |at| {
            let _ = tx.send(at);
        })
        .unwrap();

        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(fired, timer.fires_at());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let (tx, rx) = mpsc::channel::<DateTime<Utc>>();
        let last = Utc::now();
        let timer = Timer::start(
            &process(Schedule::every(1, TimeUnit::Hour)),
            Some(last),
            move |at| {
                let _ = tx.send(at);
            },
        )
        .unwrap();

        assert!(!timer.is_cancelled());
        timer.cancel();
        assert!(timer.is_cancelled());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !timer.is_finished() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(timer.is_finished());
    }
}
