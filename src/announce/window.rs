//! Due-window evaluation.

use crate::config::CalendarConfig;
use chrono::{DateTime, TimeDelta, Utc};

/// Where an event sits relative to the announcement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Starts later than the window; leave it for a later poll.
    Later,
    /// Inside the window; `until_start` is measured from the evaluation instant.
    Now {
        /// Time left until the event starts.
        until_start: TimeDelta,
    },
    /// Too close or already started; drop without posting.
    Missed,
}

/// Announcement timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    /// Smallest lead time that still gets an advance notice.
    pub min_lead: TimeDelta,
    /// Largest lead time that gets an advance notice.
    pub max_lead: TimeDelta,
    /// Offset of the start notice before the event.
    pub start_notice: TimeDelta,
}

impl Default for DueWindow {
    fn default() -> Self {
        Self {
            min_lead: TimeDelta::minutes(10),
            max_lead: TimeDelta::minutes(60),
            start_notice: TimeDelta::minutes(5),
        }
    }
}

impl DueWindow {
    /// Window from the `[calendar]` section.
    #[must_use]
    pub fn from_config(config: &CalendarConfig) -> Self {
        Self {
            min_lead: TimeDelta::minutes(config.lead_min_minutes),
            max_lead: TimeDelta::minutes(config.lead_max_minutes),
            start_notice: TimeDelta::minutes(config.start_notice_minutes),
        }
    }

    /// Classify `start` against the single instant `now`. Both bounds are
    /// inclusive.
    #[must_use]
    pub fn evaluate(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Due {
        let until_start = start - now;
        if until_start > self.max_lead {
            Due::Later
        } else if until_start < self.min_lead {
            Due::Missed
        } else {
            Due::Now { until_start }
        }
    }

    /// Delay between the advance notice and the start notice.
    #[must_use]
    pub fn start_notice_delay(&self, until_start: TimeDelta) -> std::time::Duration {
        (until_start - self.start_notice)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}
