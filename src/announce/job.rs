//! Two-phase announcement of one due event.

use crate::error::Result;
use crate::notify::{Embed, Notifier};
use crate::store::CalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_sources::{Activity, ActivityClient};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lookup of the activities planned for the next session.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Activities attached to the next scheduled session.
    async fn next_activities(&self) -> Result<Vec<Activity>>;
}

#[async_trait]
impl ActivitySource for ActivityClient {
    async fn next_activities(&self) -> Result<Vec<Activity>> {
        Ok(ActivityClient::next_activities(self).await?)
    }
}

/// Category label shown for an activity mode.
#[must_use]
pub fn mode_label(mode: &str) -> &str {
    match mode {
        "coop" => "Co-op",
        "adversarial" => "TvT",
        "arcade" => "ARCade",
        other => other,
    }
}

/// A due event with its resolved audience and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementJob {
    /// The calendar event.
    pub event: CalendarEvent,
    /// Matched rule tag, if any.
    pub classification: Option<String>,
    /// Mention posted with both notices.
    pub mention: String,
    /// Target channel id.
    pub channel: String,
    /// When the advance notice is posted.
    pub announce_at: DateTime<Utc>,
    /// When the start notice is posted.
    pub start_at: DateTime<Utc>,
    /// Wait between the two notices.
    pub start_delay: Duration,
    /// Whether the advance notice lists activities.
    pub enrich: bool,
}

/// Embed shared by both notices.
fn base_embed(event: &CalendarEvent) -> Embed {
    Embed::new(
        event.summary.clone(),
        format!("Starting <t:{}:R>", event.start.timestamp()),
    )
}

/// Advance notice: base embed with start/end times and optional activities.
pub fn advance_embed(event: &CalendarEvent, activities: &[Activity], link_base: &str) -> Embed {
    let mut embed = base_embed(event)
        .field("Start", format!("<t:{}:t>", event.start.timestamp()), true)
        .field("End", format!("<t:{}:t>", event.end.timestamp()), true);
    let link_base = link_base.trim_end_matches('/');
    for activity in activities {
        embed = embed.field(
            activity.display_name.clone(),
            format!(
                "[{} by {}]({link_base}/{})",
                mode_label(&activity.mode),
                activity.maker,
                activity.id
            ),
            false,
        );
    }
    embed
}

impl AnnouncementJob {
    /// Post the advance notice, wait, then post the start notice. A
    /// cancellation during the wait abandons the start notice.
    ///
    /// `start_delay` counts from the call, so time spent on the activity
    /// lookup and the advance post does not push the start notice back.
    pub async fn run(
        self,
        notifier: &dyn Notifier,
        activities: Option<&dyn ActivitySource>,
        link_base: &str,
        cancel: CancellationToken,
    ) {
        let start_deadline = Instant::now() + self.start_delay;
        self.run_until(notifier, activities, link_base, start_deadline, cancel).await;
    }

    /// As [`run`](Self::run), with the start notice due at `start_deadline`.
    pub async fn run_until(
        self,
        notifier: &dyn Notifier,
        activities: Option<&dyn ActivitySource>,
        link_base: &str,
        start_deadline: Instant,
        cancel: CancellationToken,
    ) {
        let listed = match (self.enrich, activities) {
            (true, Some(source)) => match source.next_activities().await {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(event = %self.event.summary, error = %e, "activity lookup failed, posting without");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let advance = advance_embed(&self.event, &listed, link_base);
        if let Err(e) = notifier
            .post_announcement(&self.channel, &self.mention, &advance)
            .await
        {
            tracing::warn!(event = %self.event.summary, error = %e, "advance notice failed");
        } else {
            tracing::info!(
                event = %self.event.summary,
                channel = %self.channel,
                start_in_secs = self.start_delay.as_secs(),
                "advance notice posted"
            );
        }

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(event = %self.event.summary, "shutdown, start notice abandoned");
                return;
            }
            () = tokio::time::sleep_until(start_deadline) => {}
        }

        if let Err(e) = notifier
            .post_announcement(&self.channel, &self.mention, &base_embed(&self.event))
            .await
        {
            tracing::warn!(event = %self.event.summary, error = %e, "start notice failed");
        }
    }
}
