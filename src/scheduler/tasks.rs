//! Scheduled task definitions and phase alignment.

use chrono::{DateTime, DurationRound, NaiveTime, TimeDelta, Utc};
use std::fmt;
use std::time::Duration;

/// One-time delay before a task's first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Run immediately.
    Immediate,
    /// Run after a fixed delay from start.
    Delay(Duration),
    /// Run at the next wall-clock minute boundary.
    NextMinute,
    /// Run at the top of the next hour.
    NextHour,
    /// Run at the next occurrence of `hour:minute` UTC.
    DailyAt {
        /// Hour of day (0-23, UTC).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },
}

impl Alignment {
    /// Delay from `now` until the first aligned instant.
    #[must_use]
    pub fn first_delay(&self, now: DateTime<Utc>) -> Duration {
        let target = match *self {
            Self::Immediate => return Duration::ZERO,
            Self::Delay(d) => return d,
            Self::NextMinute => next_boundary(now, TimeDelta::minutes(1)),
            Self::NextHour => next_boundary(now, TimeDelta::hours(1)),
            Self::DailyAt { hour, minute } => {
                let Some(at) = NaiveTime::from_hms_opt(hour, minute, 0) else {
                    return Duration::ZERO;
                };
                let today = now.date_naive().and_time(at).and_utc();
                if today >= now {
                    today
                } else {
                    today + TimeDelta::days(1)
                }
            }
        };
        (target - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn next_boundary(now: DateTime<Utc>, step: TimeDelta) -> DateTime<Utc> {
    match now.duration_trunc(step) {
        Ok(floor) if floor == now => now,
        Ok(floor) => floor + step,
        Err(_) => now,
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediately"),
            Self::Delay(d) => write!(f, "after {}s", d.as_secs()),
            Self::NextMinute => write!(f, "on the minute"),
            Self::NextHour => write!(f, "on the hour"),
            Self::DailyAt { hour, minute } => write!(f, "at {hour:02}:{minute:02} UTC"),
        }
    }
}

/// Lifecycle of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the next tick.
    Idle,
    /// An iteration is in progress.
    Running,
    /// Shut down; will not run again.
    Cancelled,
}

/// A periodic routine's schedule and runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Unique task name, used in logs.
    pub name: String,
    /// Time between iteration starts.
    pub interval: Duration,
    /// Delay before the first iteration.
    pub alignment: Alignment,
    /// Completion time of the last iteration.
    pub last_run: Option<DateTime<Utc>>,
    /// Current state.
    pub state: TaskState,
}

impl ScheduledTask {
    /// Idle task that runs immediately, then every `interval`.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            alignment: Alignment::Immediate,
            last_run: None,
            state: TaskState::Idle,
        }
    }

    /// Set the first-run alignment.
    #[must_use]
    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}
