//! Process schedules.
//!
//! A [`Schedule`] says when a process should run. It is one of:
//!
//! - **frequency based**: every `frequency` units after the last completion;
//! - **fixed time**: at `schedule_time` every day, or on one weekday;
//! - **reprocessing**: a historical date range stepped by the frequency or
//!   schedule period, producing one synthetic execution per step.
//!
//! Frequency and fixed time are mutually exclusive. A schedule that sets
//! neither, or both, is rejected by [`Schedule::cadence`].

use chrono::{DateTime, NaiveTime, TimeDelta, Utc, Weekday};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while interpreting a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Neither a frequency nor a schedule time is set.
    #[error("schedule has neither a frequency nor a schedule time")]
    InvalidFrequency,

    /// Both a frequency and a schedule time are set.
    #[error(
        "schedule mixes a frequency ({frequency_seconds}s) with a fixed schedule ({schedule_seconds}s)"
    )]
    AmbiguousCadence {
        frequency_seconds: i64,
        schedule_seconds: i64,
    },

    /// Fixed-time schedules only repeat daily or weekly.
    #[error("unsupported schedule unit '{0}', expected day or week")]
    UnsupportedScheduleUnit(TimeUnit),

    /// Weekly schedules need an ISO weekday (1 = Monday ... 7 = Sunday).
    #[error("invalid weekday {0}, expected 1 (Monday) to 7 (Sunday)")]
    InvalidWeekday(u32),

    /// Unit name could not be parsed.
    #[error("unknown time unit '{0}'")]
    UnknownUnit(String),

    /// Time of day could not be parsed.
    #[error("invalid time of day '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTimeOfDay(String),

    /// Reprocessing window ends before it starts.
    #[error("reprocessing window ends ({end}) before it starts ({start})")]
    InvalidReprocessingWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The schedule has no reprocessing window.
    #[error("schedule is not a reprocessing schedule")]
    NotReprocessing,
}

/// Unit of a frequency or schedule period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
        }
    }

    /// Canonical lowercase name, as written to catalogs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Second),
            "min" | "minute" | "minutes" => Ok(Self::Minute),
            "h" | "hour" | "hours" => Ok(Self::Hour),
            "d" | "day" | "days" => Ok(Self::Day),
            "wk" | "week" | "weeks" => Ok(Self::Week),
            other => Err(ScheduleError::UnknownUnit(other.to_string())),
        }
    }
}

/// Historical date range to reprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReprocessingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// How often a live (non-reprocessing) schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed interval after the previous completion.
    Every(TimeDelta),
    /// Fixed UTC time of day, optionally restricted to one weekday.
    At {
        time: NaiveTime,
        weekday: Option<Weekday>,
    },
}

/// When a process should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Number of `frequency_unit`s between runs (0 = not frequency based).
    pub frequency: u32,
    pub frequency_unit: TimeUnit,
    /// ISO weekday for weekly schedules.
    pub schedule: u32,
    /// UTC time of day for fixed-time schedules.
    pub schedule_time: Option<NaiveTime>,
    /// `Day` or `Week`.
    pub schedule_unit: TimeUnit,
    pub reprocessing: Option<ReprocessingWindow>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            frequency: 0,
            frequency_unit: TimeUnit::Second,
            schedule: 0,
            schedule_time: None,
            schedule_unit: TimeUnit::Day,
            reprocessing: None,
        }
    }
}

impl Schedule {
    /// Frequency based schedule.
    pub fn every(frequency: u32, unit: TimeUnit) -> Self {
        Self {
            frequency,
            frequency_unit: unit,
            ..Self::default()
        }
    }

    /// Fixed time every day.
    pub fn daily_at(time: NaiveTime) -> Self {
        Self {
            schedule_time: Some(time),
            schedule_unit: TimeUnit::Day,
            ..Self::default()
        }
    }

    /// Fixed time on one weekday.
    pub fn weekly_at(weekday: Weekday, time: NaiveTime) -> Self {
        Self {
            schedule: weekday.number_from_monday(),
            schedule_time: Some(time),
            schedule_unit: TimeUnit::Week,
            ..Self::default()
        }
    }

    /// Turns this schedule into a reprocessing request over `[start, end]`.
    pub fn with_reprocessing(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.reprocessing = Some(ReprocessingWindow { start, end });
        self
    }

    /// Frequency converted to seconds (0 when not frequency based).
    pub fn frequency_seconds(&self) -> i64 {
        i64::from(self.frequency) * self.frequency_unit.seconds()
    }

    /// Schedule period in seconds (0 when no schedule time is set).
    pub fn schedule_seconds(&self) -> i64 {
        if self.schedule_time.is_some() {
            self.schedule_unit.seconds()
        } else {
            0
        }
    }

    /// Returns true if this schedule requests historical reprocessing.
    pub fn is_reprocessing(&self) -> bool {
        self.reprocessing.is_some()
    }

    /// Resolves the live firing cadence.
    pub fn cadence(&self) -> Result<Cadence, ScheduleError> {
        let frequency_seconds = self.frequency_seconds();
        let schedule_seconds = self.schedule_seconds();

        match (frequency_seconds > 0, schedule_seconds > 0) {
            (false, false) => Err(ScheduleError::InvalidFrequency),
            (true, true) => Err(ScheduleError::AmbiguousCadence {
                frequency_seconds,
                schedule_seconds,
            }),
            (true, false) => TimeDelta::try_seconds(frequency_seconds)
                .map(Cadence::Every)
                .ok_or(ScheduleError::InvalidFrequency),
            (false, true) => {
                let Some(time) = self.schedule_time else {
                    return Err(ScheduleError::InvalidFrequency);
                };
                let weekday = match self.schedule_unit {
                    TimeUnit::Day => None,
                    TimeUnit::Week => Some(weekday_from_iso(self.schedule)?),
                    other => return Err(ScheduleError::UnsupportedScheduleUnit(other)),
                };
                Ok(Cadence::At { time, weekday })
            }
        }
    }

    /// Synthetic execution dates of a reprocessing schedule.
    ///
    /// Steps from the window start by `frequency_seconds + schedule_seconds`
    /// up to and including the window end.
    pub fn reprocessing_dates(&self) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
        let window = self.reprocessing.ok_or(ScheduleError::NotReprocessing)?;
        if window.end < window.start {
            return Err(ScheduleError::InvalidReprocessingWindow {
                start: window.start,
                end: window.end,
            });
        }

        self.cadence()?;
        let step = TimeDelta::try_seconds(self.frequency_seconds() + self.schedule_seconds())
            .ok_or(ScheduleError::InvalidFrequency)?;

        let mut dates = Vec::new();
        let mut date = window.start;
        while date <= window.end {
            dates.push(date);
            match date.checked_add_signed(step) {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(dates)
    }
}

/// Parses a time of day written as `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ScheduleError::InvalidTimeOfDay(value.to_string()))
}

fn weekday_from_iso(day: u32) -> Result<Weekday, ScheduleError> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(ScheduleError::InvalidWeekday(other)),
    }
}
