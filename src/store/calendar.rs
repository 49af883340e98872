//! Upcoming calendar events and the persisted processing cursor.

use crate::error::Result;
use crate::store::persist;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One timed calendar occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Provider event id.
    pub id: String,
    /// Event title, matched against classification rules.
    pub summary: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
}

impl From<herald_sources::RemoteEvent> for CalendarEvent {
    fn from(ev: herald_sources::RemoteEvent) -> Self {
        Self {
            id: ev.id,
            summary: ev.summary,
            start: ev.start,
            end: ev.end,
        }
    }
}

/// Lists events from a calendar provider.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events whose occurrence extends past `since`, ascending by start,
    /// with recurring events expanded.
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<CalendarEvent>>;
}

#[async_trait]
impl CalendarSource for herald_sources::CalendarClient {
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        let events = self.list_events(since).await?;
        Ok(events.into_iter().map(CalendarEvent::from).collect())
    }
}

/// Queue of upcoming events keyed by unique start time.
#[derive(Debug, Default)]
pub struct CalendarStore {
    events: BTreeMap<DateTime<Utc>, CalendarEvent>,
}

impl CalendarStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. An event whose start time is already stored is
    /// ignored and `false` is returned.
    pub fn insert(&mut self, event: CalendarEvent) -> bool {
        match self.events.entry(event.start) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(event);
                true
            }
        }
    }

    /// Replace the stored set with a fresh fetch of events starting after
    /// `since`. The previous set is kept if the fetch fails.
    ///
    /// # Errors
    ///
    /// Propagates the source's error.
    pub async fn sync(
        &mut self,
        source: &dyn CalendarSource,
        since: DateTime<Utc>,
    ) -> Result<usize> {
        let fetched = source.events_since(since).await?;
        self.events.clear();
        let mut skipped = 0usize;
        for event in fetched.into_iter().filter(|e| e.start > since) {
            if !self.insert(event) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "calendar events sharing a start time ignored");
        }
        Ok(self.events.len())
    }

    /// Remove and return the event with the earliest start.
    pub fn pop_earliest(&mut self) -> Option<CalendarEvent> {
        self.events.pop_first().map(|(_, event)| event)
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Start time of the most recently processed event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCursor {
    /// `None` until the first event is handled.
    pub last_processed_start: Option<DateTime<Utc>>,
}

impl CalendarCursor {
    /// Default cursor location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        crate::herald_dirs::calendar_cursor_file()
    }

    /// Load the cursor; a missing file yields an empty cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or corrupt.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(persist::read_json(path)?.unwrap_or_default())
    }

    /// Persist the cursor atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_json_atomic(path, self)
    }

    /// Lower bound of the next sync window. A cursor in the past is
    /// replaced by `now` so stale events are never fetched.
    #[must_use]
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_processed_start {
            Some(ts) if ts >= now => ts,
            _ => now,
        }
    }

    /// `true` if `start` was already handled.
    #[must_use]
    pub fn covers(&self, start: DateTime<Utc>) -> bool {
        self.last_processed_start.is_some_and(|ts| start <= ts)
    }

    /// Advance to `start` if it is later than the current position.
    pub fn advance(&mut self, start: DateTime<Utc>) {
        if !self.covers(start) {
            self.last_processed_start = Some(start);
        }
    }
}
