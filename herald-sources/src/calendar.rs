//! Calendar events listing (Google Calendar v3 `events.list`).
//!
//! Recurring events are expanded into single occurrences and results are
//! ordered by start time. Entries without a summary or without a timed
//! start/end (all-day events) are skipped.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::http;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

/// Public Google Calendar API root.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Upper bound on pages followed per listing.
const MAX_PAGES: usize = 20;

/// One timed calendar occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Provider event id.
    pub id: String,
    /// Event title.
    pub summary: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<RawTime>,
    #[serde(default)]
    end: Option<RawTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTime {
    #[serde(default)]
    date_time: Option<DateTime<chrono::FixedOffset>>,
}

impl RawEvent {
    fn into_timed(self) -> Option<RemoteEvent> {
        let start = self.start?.date_time?.with_timezone(&Utc);
        let end = self.end?.date_time?.with_timezone(&Utc);
        Some(RemoteEvent {
            id: self.id,
            summary: self.summary?,
            start,
            end,
        })
    }
}

/// Client for a single calendar.
pub struct CalendarClient {
    client: reqwest::Client,
    api_base: String,
    calendar_id: String,
    access_token: Option<String>,
}

impl CalendarClient {
    /// Create a client for `calendar_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] for a blank calendar id, or an HTTP
    /// error if the client cannot be built.
    pub fn new(
        config: &SourcesConfig,
        calendar_id: impl Into<String>,
        access_token: Option<String>,
    ) -> Result<Self, SourceError> {
        let calendar_id = calendar_id.into();
        if calendar_id.trim().is_empty() {
            return Err(SourceError::Config("calendar id is empty".into()));
        }
        Ok(Self {
            client: http::build_client(config)?,
            api_base: CALENDAR_API_BASE.to_owned(),
            calendar_id,
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Override the API root.
    #[must_use]
    pub fn with_api_base(mut self, base: impl AsRef<str>) -> Self {
        self.api_base = http::trim_base(base.as_ref());
        self
    }

    fn events_url(&self) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| SourceError::Config(format!("invalid calendar api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SourceError::Config("calendar api base cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    /// List timed events starting at or after `time_min`, ascending by start.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or payload failures.
    pub async fn list_events(
        &self,
        time_min: DateTime<Utc>,
    ) -> Result<Vec<RemoteEvent>, SourceError> {
        let url = self.events_url()?;
        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self.client.get(url.clone()).query(&[
                ("timeMin", time_min.as_str()),
                ("orderBy", "startTime"),
                ("singleEvents", "true"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            if let Some(token) = &self.access_token {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }

            let response = request
                .send()
                .await
                .map_err(|e| SourceError::Http(format!("calendar request failed: {e}")))?;
            if !response.status().is_success() {
                return Err(SourceError::from_response(response).await);
            }
            let body = response
                .text()
                .await
                .map_err(|e| SourceError::Http(format!("calendar read failed: {e}")))?;
            let page: EventsPage = serde_json::from_str(&body)
                .map_err(|e| SourceError::Parse(format!("calendar events: {e}")))?;

            events.extend(page.items.into_iter().filter_map(RawEvent::into_timed));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(events),
            }
        }

        tracing::warn!(pages = MAX_PAGES, "calendar listing truncated");
        Ok(events)
    }
}
