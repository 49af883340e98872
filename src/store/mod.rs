//! Durable state: per-source snapshots, the calendar queue and its cursor.

pub mod calendar;
pub mod persist;
pub mod snapshot;

pub use calendar::{CalendarCursor, CalendarEvent, CalendarSource, CalendarStore};
pub use snapshot::{Snapshot, SnapshotStore, SourceFamily, SourceRecord};
