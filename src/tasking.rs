//! Wiring of herald's routines onto the scheduler.
//!
//! [`Herald::start`] builds the upstream clients the config enables, the
//! detectors and the announcement engine, registers one scheduled task per
//! routine and posts a lifecycle notice to the diagnostics channel. The
//! routines themselves are plain async functions so they can be driven
//! directly.

use crate::announce::{ActivitySource, AnnouncementEngine, AnnouncementSettings};
use crate::config::{HeraldConfig, RecruitmentConfig};
use crate::detect::{
    ChangeDetector, ReleaseFeedDetector, SyncRepoDetector, WorkshopDetector, run_detector,
};
use crate::error::{HeraldError, Result};
use crate::lock::{LockOutcome, ResourceLock};
use crate::notify::{Notifier, post_report_or_file};
use crate::scheduler::{Alignment, ScheduledTask, Scheduler};
use crate::store::{CalendarCursor, CalendarSource, SnapshotStore};
use chrono::{Datelike, Utc, Weekday};
use herald_sources::{
    ActivityClient, CalendarClient, ReleaseFeedClient, SyncRepoClient, WorkshopClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Attachment name of oversized mod update reports.
pub const MOD_UPDATE_FILENAME: &str = "modupdate.txt";

/// Attachment name of oversized repository reports.
pub const REPO_UPDATE_FILENAME: &str = "repoupdate.txt";

/// Posted to the diagnostics channel once every task is scheduled.
pub const STARTUP_MESSAGE: &str = "herald is fully loaded";

const RECRUITMENT_FILENAME: &str = "recruit_post.md";

/// Resolved destinations of reports and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    /// Channel id receiving mod update reports.
    pub staff_channel: String,
    /// Mention prepended to staff reports.
    pub admin_mention: String,
    /// Channel id receiving sync repository reports.
    pub announcements_channel: String,
    /// Operator-only channel id.
    pub diagnostics_channel: String,
}

impl Routing {
    /// Resolve the `[reports]` names through `[channels]` and `[roles]`.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] for unknown names.
    pub fn from_config(config: &HeraldConfig) -> Result<Self> {
        let reports = &config.reports;
        Ok(Self {
            staff_channel: config.channel_id(&reports.staff_channel)?.to_owned(),
            admin_mention: config.mention_for(&reports.admin_role)?,
            announcements_channel: config.channel_id(&reports.announcements_channel)?.to_owned(),
            diagnostics_channel: config.channel_id(&reports.diagnostics_channel)?.to_owned(),
        })
    }
}

/// Post `text` to the diagnostics channel. Delivery failures are logged only.
pub async fn report_failure(notifier: &dyn Notifier, routing: &Routing, text: &str) {
    if let Err(e) = notifier
        .post_report(&routing.diagnostics_channel, None, text)
        .await
    {
        warn!(error = %e, failure = text, "diagnostic not delivered");
    }
}

/// Run every mod detector, then post the concatenated reports to staff.
///
/// Detectors run independently: one failing does not hide another's report.
///
/// # Errors
///
/// Returns the notifier's error if the combined report cannot be posted.
pub async fn check_mod_updates(
    detectors: &[Arc<dyn ChangeDetector>],
    store: &SnapshotStore,
    notifier: &dyn Notifier,
    routing: &Routing,
) -> Result<()> {
    let mut combined = String::new();
    for detector in detectors {
        let (report, errors) = run_detector(detector.as_ref(), store).await.into_parts();
        for error in &errors {
            report_failure(notifier, routing, error).await;
        }
        if let Some(report) = report {
            combined.push_str(&report);
        }
    }
    if combined.is_empty() {
        return Ok(());
    }
    post_report_or_file(
        notifier,
        &routing.staff_channel,
        Some(&routing.admin_mention),
        &combined,
        "Mod update",
        MOD_UPDATE_FILENAME,
    )
    .await
}

/// Run the sync repository detector under `lock`. A held lock skips the tick.
///
/// # Errors
///
/// Returns the notifier's error if the report cannot be posted.
pub async fn check_sync_repo(
    detector: &dyn ChangeDetector,
    store: &SnapshotStore,
    lock: &ResourceLock,
    notifier: &dyn Notifier,
    routing: &Routing,
) -> Result<()> {
    let outcome = lock
        .try_acquire_and_run("sync-repo check", || async {
            Ok::<_, HeraldError>(run_detector(detector, store).await)
        })
        .await;
    match outcome {
        LockOutcome::Completed(detection) => {
            let (report, errors) = detection.into_parts();
            for error in &errors {
                report_failure(notifier, routing, error).await;
            }
            match report {
                Some(report) => {
                    post_report_or_file(
                        notifier,
                        &routing.announcements_channel,
                        None,
                        &report,
                        "Repository update",
                        REPO_UPDATE_FILENAME,
                    )
                    .await
                }
                None => Ok(()),
            }
        }
        LockOutcome::Failed(e) => Err(e),
        LockOutcome::Locked { blocked, holder } => {
            debug!(%blocked, ?holder, "sync repository check skipped");
            Ok(())
        }
    }
}

/// One calendar poll at the current time. Failures are also reported to
/// the diagnostics channel.
///
/// # Errors
///
/// Returns the poll's error after reporting it.
pub async fn poll_calendar(
    engine: &AnnouncementEngine,
    notifier: &dyn Notifier,
    routing: &Routing,
) -> Result<()> {
    match engine.poll(Utc::now()).await {
        Ok(summary) if summary.scheduled + summary.ignored + summary.missed > 0 => {
            info!(?summary, "calendar poll");
            Ok(())
        }
        Ok(summary) => {
            debug!(?summary, "calendar poll");
            Ok(())
        }
        Err(e) => {
            report_failure(notifier, routing, &format!("Error checking calendar: {e}")).await;
            Err(e)
        }
    }
}

/// Post the recruitment reminder with its attachment if `today` is a
/// configured weekday.
///
/// # Errors
///
/// Returns an error if the attachment cannot be read or posted.
pub async fn post_recruitment(
    config: &RecruitmentConfig,
    notifier: &dyn Notifier,
    routing: &Routing,
    today: Weekday,
) -> Result<()> {
    if !config.weekdays.contains(&today) {
        debug!(%today, "no recruitment post today");
        return Ok(());
    }
    let bytes = tokio::fs::read(&config.post_file).await?;
    let filename = config
        .post_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(RECRUITMENT_FILENAME);
    notifier
        .post_file(
            &routing.staff_channel,
            Some(&routing.admin_mention),
            &config.message,
            filename,
            bytes,
        )
        .await
}

/// Where persistent state lives.
#[derive(Debug, Clone)]
pub struct StatePaths {
    /// Directory of per-family snapshot files.
    pub snapshots_dir: PathBuf,
    /// Calendar cursor file.
    pub calendar_cursor: PathBuf,
}

impl Default for StatePaths {
    fn default() -> Self {
        Self {
            snapshots_dir: crate::herald_dirs::snapshots_dir(),
            calendar_cursor: CalendarCursor::default_path(),
        }
    }
}

/// The running service.
pub struct Herald {
    scheduler: Scheduler,
    engine: Option<Arc<AnnouncementEngine>>,
}

impl Herald {
    /// Build every enabled routine, start the scheduler and announce startup.
    ///
    /// Release feeds are enabled by a non-empty `[release_feeds]`, the
    /// workshop by `workshop.collection_id`, the sync repository by
    /// `sync_repo.metadata_url` and the calendar by `calendar.calendar_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if routing cannot be resolved, a client cannot be
    /// built, a calendar rule is invalid or the cursor file is unreadable.
    pub async fn start(
        config: &HeraldConfig,
        notifier: Arc<dyn Notifier>,
        paths: StatePaths,
    ) -> Result<Self> {
        let routing = Arc::new(Routing::from_config(config)?);
        let sources = config.http.sources_config();
        let store = Arc::new(SnapshotStore::new(paths.snapshots_dir));
        let mut scheduler = Scheduler::new(CancellationToken::new());
        let schedule = &config.schedule;

        let mut mod_detectors: Vec<Arc<dyn ChangeDetector>> = Vec::new();
        if !config.release_feeds.is_empty() {
            let client = ReleaseFeedClient::new(&sources, config.github_token.clone())?;
            mod_detectors.push(Arc::new(ReleaseFeedDetector::new(
                client,
                config.release_feeds.clone(),
            )));
        }
        if !config.workshop.collection_id.trim().is_empty() {
            let mut client = WorkshopClient::new(&sources)?;
            if let Some(base) = &config.workshop.api_base {
                client = client.with_api_base(base);
            }
            if let Some(base) = &config.workshop.community_base {
                client = client.with_community_base(base);
            }
            mod_detectors.push(Arc::new(WorkshopDetector::new(
                client,
                config.workshop.collection_id.clone(),
            )));
        }
        if !mod_detectors.is_empty() {
            let detectors: Arc<[Arc<dyn ChangeDetector>]> = mod_detectors.into();
            let store = Arc::clone(&store);
            let notifier = Arc::clone(&notifier);
            let routing = Arc::clone(&routing);
            scheduler.register(
                ScheduledTask::new("mod-check", schedule.mod_check_interval())
                    .aligned(Alignment::NextHour),
                move || {
                    let detectors = Arc::clone(&detectors);
                    let store = Arc::clone(&store);
                    let notifier = Arc::clone(&notifier);
                    let routing = Arc::clone(&routing);
                    async move {
                        check_mod_updates(&detectors, &store, notifier.as_ref(), &routing).await
                    }
                },
            )?;
        }

        if !config.sync_repo.metadata_url.trim().is_empty() {
            let client = SyncRepoClient::new(&sources, config.sync_repo.metadata_url.clone())?;
            let detector: Arc<dyn ChangeDetector> = Arc::new(SyncRepoDetector::new(client));
            let lock = scheduler.resource_lock();
            let store = Arc::clone(&store);
            let notifier = Arc::clone(&notifier);
            let routing = Arc::clone(&routing);
            scheduler.register(
                ScheduledTask::new("sync-repo", schedule.sync_repo_interval()).aligned(
                    Alignment::Delay(Duration::from_secs(schedule.sync_repo_start_delay_secs)),
                ),
                move || {
                    let detector = Arc::clone(&detector);
                    let lock = lock.clone();
                    let store = Arc::clone(&store);
                    let notifier = Arc::clone(&notifier);
                    let routing = Arc::clone(&routing);
                    async move {
                        check_sync_repo(
                            detector.as_ref(),
                            &store,
                            &lock,
                            notifier.as_ref(),
                            &routing,
                        )
                        .await
                    }
                },
            )?;
        }

        let mut engine = None;
        if !config.calendar.calendar_id.trim().is_empty() {
            let mut client = CalendarClient::new(
                &sources,
                config.calendar.calendar_id.clone(),
                config.calendar.access_token.clone(),
            )?;
            if let Some(base) = &config.calendar.api_base {
                client = client.with_api_base(base);
            }
            let calendar: Arc<dyn CalendarSource> = Arc::new(client);
            let activities: Option<Arc<dyn ActivitySource>> =
                if config.activities.api_base.trim().is_empty() {
                    None
                } else {
                    Some(Arc::new(ActivityClient::new(
                        &sources,
                        &config.activities.api_base,
                        config.activities.token.clone(),
                    )?))
                };
            let built = Arc::new(AnnouncementEngine::new(
                AnnouncementSettings::from_config(config)?,
                calendar,
                activities,
                Arc::clone(&notifier),
                paths.calendar_cursor,
                scheduler.cancellation().child_token(),
            )?);
            let poller = Arc::clone(&built);
            let notifier = Arc::clone(&notifier);
            let routing = Arc::clone(&routing);
            scheduler.register(
                ScheduledTask::new("calendar", schedule.calendar_interval())
                    .aligned(Alignment::NextMinute),
                move || {
                    let engine = Arc::clone(&poller);
                    let notifier = Arc::clone(&notifier);
                    let routing = Arc::clone(&routing);
                    async move { poll_calendar(&engine, notifier.as_ref(), &routing).await }
                },
            )?;
            engine = Some(built);
        }

        if config.recruitment.enabled {
            let recruitment = Arc::new(config.recruitment.clone());
            let notifier = Arc::clone(&notifier);
            let routing = Arc::clone(&routing);
            scheduler.register(
                ScheduledTask::new("recruitment", Duration::from_secs(24 * 60 * 60)).aligned(
                    Alignment::DailyAt {
                        hour: recruitment.hour,
                        minute: recruitment.minute,
                    },
                ),
                move || {
                    let recruitment = Arc::clone(&recruitment);
                    let notifier = Arc::clone(&notifier);
                    let routing = Arc::clone(&routing);
                    async move {
                        post_recruitment(
                            &recruitment,
                            notifier.as_ref(),
                            &routing,
                            Utc::now().weekday(),
                        )
                        .await
                    }
                },
            )?;
        }

        scheduler.start();
        info!(tasks = scheduler.tasks().len(), "herald started");
        if let Err(e) = notifier
            .post_report(&routing.diagnostics_channel, None, STARTUP_MESSAGE)
            .await
        {
            warn!(error = %e, "startup notice not delivered");
        }

        Ok(Self { scheduler, engine })
    }

    /// Current state of the scheduled tasks.
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.scheduler.tasks()
    }

    /// Stop scheduling, let in-flight iterations finish and abandon pending
    /// start notices.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        if let Some(engine) = self.engine {
            engine.shutdown().await;
        }
    }
}
