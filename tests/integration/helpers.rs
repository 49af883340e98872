//! Shared fakes for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use herald::HeraldConfig;
use herald::error::{HeraldError, Result};
use herald::notify::{Embed, Notifier};
use herald::store::{CalendarEvent, CalendarSource};
use herald::tasking::Routing;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One captured notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Posted {
    Report {
        channel: String,
        mention: Option<String>,
        text: String,
    },
    File {
        channel: String,
        filename: String,
    },
    Announcement {
        channel: String,
        mention: String,
        embed: Embed,
    },
}

/// Notifier that records every call in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    posted: Mutex<Vec<Posted>>,
}

impl RecordingNotifier {
    pub(crate) fn take(&self) -> Vec<Posted> {
        std::mem::take(&mut *self.posted.lock().unwrap())
    }

    pub(crate) fn announced_titles(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .filter_map(|p| match p {
                Posted::Announcement { embed, .. } => Some(embed.title),
                _ => None,
            })
            .collect()
    }

    fn record(&self, posted: Posted) -> Result<()> {
        self.posted.lock().unwrap().push(posted);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_report(&self, channel: &str, mention: Option<&str>, text: &str) -> Result<()> {
        self.record(Posted::Report {
            channel: channel.to_owned(),
            mention: mention.map(str::to_owned),
            text: text.to_owned(),
        })
    }

    async fn post_file(
        &self,
        channel: &str,
        _mention: Option<&str>,
        _caption: &str,
        filename: &str,
        _bytes: Vec<u8>,
    ) -> Result<()> {
        self.record(Posted::File {
            channel: channel.to_owned(),
            filename: filename.to_owned(),
        })
    }

    async fn post_announcement(&self, channel: &str, mention: &str, embed: &Embed) -> Result<()> {
        self.record(Posted::Announcement {
            channel: channel.to_owned(),
            mention: mention.to_owned(),
            embed: embed.clone(),
        })
    }
}

/// Calendar returning a fixed event list, filtered the way the provider
/// filters by `timeMin`.
#[derive(Default)]
pub(crate) struct FakeCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeCalendar {
    pub(crate) fn set(&self, events: Vec<CalendarEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub(crate) fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<CalendarEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(HeraldError::Network("calendar unreachable".into()));
        }
        let mut events: Vec<_> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.end > since)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }
}

pub(crate) fn event(id: &str, summary: &str, start: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent {
        id: id.to_owned(),
        summary: summary.to_owned(),
        start,
        end: start + TimeDelta::hours(2),
    }
}

/// Config with every report channel, the admin role and the default
/// calendar channel resolvable.
pub(crate) fn routed_config() -> HeraldConfig {
    let mut config = HeraldConfig::default();
    for (name, id) in [
        ("staff", "100"),
        ("announcements", "101"),
        ("diagnostics", "102"),
        ("op_news", "103"),
        ("training", "104"),
    ] {
        config.channels.insert(name.into(), id.into());
    }
    config.roles.insert("admin".into(), "9".into());
    config.roles.insert("trainee".into(), "10".into());
    config
}

pub(crate) fn routing() -> Routing {
    Routing::from_config(&routed_config()).unwrap()
}
