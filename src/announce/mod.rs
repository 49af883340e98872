//! Announcement engine: turns due calendar events into two-phase notices.
//!
//! Each poll re-syncs the [`CalendarStore`] from the persisted cursor, then
//! pops events in start order. The clock is read once per poll and every
//! event of that poll is judged against the same instant. Events later than
//! the window end the poll; events too close are dropped; due events are
//! classified, the cursor advances to their start, and a job posts the
//! advance notice immediately and the start notice shortly before the event.

pub mod classify;
pub mod job;
pub mod window;

pub use classify::{Action, Classification, Classifier};
pub use job::{ActivitySource, AnnouncementJob, advance_embed, mode_label};
pub use window::{Due, DueWindow};

use crate::config::HeraldConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::store::{CalendarCursor, CalendarSource, CalendarStore};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Immutable announcement policy.
#[derive(Debug)]
pub struct AnnouncementSettings {
    /// Due window and start-notice offset.
    pub window: DueWindow,
    /// Event-type rules.
    pub classifier: Classifier,
    /// Tag whose advance notice lists activities.
    pub enrich_tag: String,
    /// Prefix of activity links.
    pub link_base: String,
}

impl AnnouncementSettings {
    /// Build from the `[calendar]` and `[activities]` sections.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule cannot be compiled or resolved.
    pub fn from_config(config: &HeraldConfig) -> Result<Self> {
        Ok(Self {
            window: DueWindow::from_config(&config.calendar),
            classifier: Classifier::from_config(config)?,
            enrich_tag: config.activities.enrich_tag.clone(),
            link_base: config.activities.link_base.clone(),
        })
    }
}

/// Counters for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Events stored after the sync.
    pub fetched: usize,
    /// Jobs started.
    pub scheduled: usize,
    /// Due events consumed by an ignore rule.
    pub ignored: usize,
    /// Events dropped for being too close or past.
    pub missed: usize,
}

struct EngineState {
    store: CalendarStore,
    cursor: CalendarCursor,
}

/// Polls the calendar and runs announcement jobs.
pub struct AnnouncementEngine {
    settings: Arc<AnnouncementSettings>,
    calendar: Arc<dyn CalendarSource>,
    activities: Option<Arc<dyn ActivitySource>>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<EngineState>,
    cursor_path: PathBuf,
    jobs: TaskTracker,
    cancel: CancellationToken,
}

impl AnnouncementEngine {
    /// Load the cursor from `cursor_path` and build the engine. Jobs observe
    /// `cancel` while waiting for their start notice.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing cursor file is unreadable.
    pub fn new(
        settings: AnnouncementSettings,
        calendar: Arc<dyn CalendarSource>,
        activities: Option<Arc<dyn ActivitySource>>,
        notifier: Arc<dyn Notifier>,
        cursor_path: PathBuf,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let cursor = CalendarCursor::load(&cursor_path)?;
        tracing::debug!(cursor = ?cursor.last_processed_start, "calendar cursor loaded");
        Ok(Self {
            settings: Arc::new(settings),
            calendar,
            activities,
            notifier,
            state: Mutex::new(EngineState {
                store: CalendarStore::new(),
                cursor,
            }),
            cursor_path,
            jobs: TaskTracker::new(),
            cancel,
        })
    }

    /// One calendar poll evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the calendar cannot be fetched or the cursor
    /// cannot be saved. Jobs already started keep running.
    pub async fn poll(&self, now: DateTime<Utc>) -> Result<PollSummary> {
        let mut state = self.state.lock().await;
        let EngineState { store, cursor } = &mut *state;
        let mut summary = PollSummary::default();

        let since = cursor.window_start(now);
        summary.fetched = store.sync(self.calendar.as_ref(), since).await?;
        let before = cursor.clone();

        while let Some(event) = store.pop_earliest() {
            if cursor.covers(event.start) {
                continue;
            }
            let until_start = match self.settings.window.evaluate(event.start, now) {
                Due::Later => {
                    store.insert(event);
                    break;
                }
                Due::Missed => {
                    tracing::debug!(event = %event.summary, start = %event.start, "outside due window, dropped");
                    summary.missed += 1;
                    continue;
                }
                Due::Now { until_start } => until_start,
            };

            cursor.advance(event.start);
            let classification = self.settings.classifier.classify(&event.summary);
            let (mention, channel) = match classification.action {
                Action::Ignore => {
                    tracing::info!(event = %event.summary, tag = ?classification.tag, "ignored event consumed");
                    summary.ignored += 1;
                    continue;
                }
                Action::Announce { mention, channel } => (mention, channel),
            };

            let enrich = self.activities.is_some()
                && classification.tag.as_deref() == Some(self.settings.enrich_tag.as_str());
            let job = AnnouncementJob {
                start_at: event.start - self.settings.window.start_notice,
                announce_at: now,
                start_delay: self.settings.window.start_notice_delay(until_start),
                classification: classification.tag,
                mention,
                channel,
                enrich,
                event,
            };
            tracing::info!(
                event = %job.event.summary,
                tag = ?job.classification,
                start = %job.event.start,
                "scheduling announcement"
            );
            self.spawn_job(job);
            summary.scheduled += 1;
        }

        if *cursor != before {
            cursor.save(&self.cursor_path)?;
        }
        Ok(summary)
    }

    fn spawn_job(&self, job: AnnouncementJob) {
        let notifier = Arc::clone(&self.notifier);
        let activities = self.activities.clone();
        let settings = Arc::clone(&self.settings);
        let cancel = self.cancel.child_token();
        let start_deadline = tokio::time::Instant::now() + job.start_delay;
        self.jobs.spawn(async move {
            job.run_until(
                notifier.as_ref(),
                activities.as_deref(),
                &settings.link_base,
                start_deadline,
                cancel,
            )
            .await;
        });
    }

    /// Jobs still waiting for or posting their notices.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Cancel pending start notices and wait for every job to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.jobs.close();
        self.jobs.wait().await;
    }
}
