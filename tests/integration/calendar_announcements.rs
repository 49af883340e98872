//! Announcement engine over a fake calendar: due window, start order,
//! classification, restart resumption and cancellation.

use crate::helpers::{FakeCalendar, Posted, RecordingNotifier, event, routed_config, routing};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use herald::HeraldConfig;
use herald::announce::{AnnouncementEngine, AnnouncementSettings};
use herald::config::{CalendarRule, IGNORED_ROLE};
use herald::notify::Notifier;
use herald::store::{CalendarCursor, CalendarSource};
use herald::tasking::poll_calendar;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 14, 18, 0, 0).unwrap()
}

fn mins(n: i64) -> TimeDelta {
    TimeDelta::minutes(n)
}

fn engine(
    config: &HeraldConfig,
    calendar: &Arc<FakeCalendar>,
    notifier: &Arc<RecordingNotifier>,
    cursor: &Path,
) -> AnnouncementEngine {
    let calendar: Arc<dyn CalendarSource> = calendar.clone();
    let notifier: Arc<dyn Notifier> = notifier.clone();
    AnnouncementEngine::new(
        AnnouncementSettings::from_config(config).unwrap(),
        calendar,
        None,
        notifier,
        cursor.to_path_buf(),
        CancellationToken::new(),
    )
    .unwrap()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn due_events_are_announced_in_start_order_across_polls() {
    let dir = tempfile::tempdir().unwrap();
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.set(vec![
        event("a", "Op A", t0() + mins(30)),
        event("b", "Op B", t0() + mins(15)),
        event("c", "Op C", t0() + mins(90)),
        event("d", "Op D", t0() + mins(5)),
    ]);
    let engine = engine(&routed_config(), &calendar, &notifier, &dir.path().join("cursor.json"));

    let summary = engine.poll(t0()).await.unwrap();
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.scheduled, 2);
    assert_eq!(summary.missed, 1);
    settle().await;
    assert_eq!(notifier.announced_titles(), vec!["Op B", "Op A"]);

    let summary = engine.poll(t0() + mins(1)).await.unwrap();
    assert_eq!(summary.scheduled, 0, "nothing new is due yet");

    let summary = engine.poll(t0() + mins(35)).await.unwrap();
    assert_eq!(summary.scheduled, 1);
    settle().await;
    let titles = notifier.announced_titles();
    assert!(titles.contains(&"Op C".to_owned()), "{titles:?}");
    assert!(!titles.contains(&"Op A".to_owned()), "{titles:?}");

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_notice_is_posted_five_minutes_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.set(vec![event("a", "Sunday Op", t0() + mins(20))]);
    let engine = engine(&routed_config(), &calendar, &notifier, &dir.path().join("cursor.json"));

    engine.poll(t0()).await.unwrap();
    settle().await;
    let advance = notifier.take();
    match advance.as_slice() {
        [Posted::Announcement { embed, mention, channel }] => {
            assert_eq!(channel, "103");
            assert_eq!(mention, "@here");
            assert!(embed.fields.iter().any(|f| f.name == "Start"));
        }
        other => panic!("expected the advance notice, got {other:?}"),
    }

    tokio::time::advance(Duration::from_secs(15 * 60 - 1)).await;
    settle().await;
    assert!(notifier.take().is_empty());

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    match notifier.take().as_slice() {
        [Posted::Announcement { embed, .. }] => {
            assert_eq!(embed.title, "Sunday Op");
            assert!(embed.fields.is_empty());
        }
        other => panic!("expected the start notice, got {other:?}"),
    }
    assert_eq!(engine.pending_jobs(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_abandons_pending_start_notice() {
    let dir = tempfile::tempdir().unwrap();
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.set(vec![event("a", "Sunday Op", t0() + mins(20))]);
    let engine = engine(&routed_config(), &calendar, &notifier, &dir.path().join("cursor.json"));

    engine.poll(t0()).await.unwrap();
    settle().await;
    assert_eq!(notifier.take().len(), 1);

    engine.shutdown().await;
    tokio::time::advance(Duration::from_secs(3600)).await;
    settle().await;
    assert!(notifier.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_from_persisted_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let cursor_path = dir.path().join("cursor.json");
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.set(vec![event("a", "Op A", t0() + mins(30))]);

    let first = engine(&routed_config(), &calendar, &notifier, &cursor_path);
    assert_eq!(first.poll(t0()).await.unwrap().scheduled, 1);
    first.shutdown().await;
    drop(first);
    assert_eq!(
        CalendarCursor::load(&cursor_path).unwrap().last_processed_start,
        Some(t0() + mins(30))
    );
    notifier.take();

    calendar.set(vec![
        event("a", "Op A", t0() + mins(30)),
        event("e", "Op E", t0() + mins(40)),
    ]);
    let second = engine(&routed_config(), &calendar, &notifier, &cursor_path);
    let summary = second.poll(t0() + mins(1)).await.unwrap();
    assert_eq!(summary.scheduled, 1);
    settle().await;
    assert_eq!(notifier.announced_titles(), vec!["Op E"]);
    second.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rules_route_events_and_ignored_events_are_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = routed_config();
    config.calendar.rules = vec![
        CalendarRule {
            tag: "cancelled".into(),
            pattern: r"^\[cancelled\]".into(),
            role: IGNORED_ROLE.into(),
            channel: String::new(),
        },
        CalendarRule {
            tag: "training".into(),
            pattern: "training".into(),
            role: "trainee".into(),
            channel: "training".into(),
        },
    ];
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.set(vec![
        event("x", "[Cancelled] Main Op", t0() + mins(20)),
        event("t", "Basic TRAINING", t0() + mins(25)),
        event("m", "Sunday Main Op", t0() + mins(30)),
    ]);
    let engine = engine(&config, &calendar, &notifier, &dir.path().join("cursor.json"));

    let summary = engine.poll(t0()).await.unwrap();
    assert_eq!(summary.ignored, 1);
    assert_eq!(summary.scheduled, 2);
    settle().await;

    let routed: Vec<(String, String, String)> = notifier
        .take()
        .into_iter()
        .filter_map(|p| match p {
            Posted::Announcement {
                channel,
                mention,
                embed,
            } => Some((embed.title, channel, mention)),
            _ => None,
        })
        .collect();
    assert_eq!(
        routed,
        vec![
            ("Basic TRAINING".into(), "104".into(), "<@&10>".into()),
            ("Sunday Main Op".into(), "103".into(), "@here".into()),
        ]
    );

    let again = engine.poll(t0() + mins(1)).await.unwrap();
    assert_eq!(again.ignored, 0, "ignored event is consumed, not re-evaluated");
    engine.shutdown().await;
}

#[tokio::test]
async fn calendar_failure_is_reported_to_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    calendar.fail(true);
    let engine = engine(&routed_config(), &calendar, &notifier, &dir.path().join("cursor.json"));

    let result = poll_calendar(&engine, notifier.as_ref(), &routing()).await;
    assert!(result.is_err());
    assert_eq!(calendar.calls(), 1);
    match notifier.take().as_slice() {
        [Posted::Report { channel, text, .. }] => {
            assert_eq!(channel, "102");
            assert!(text.starts_with("Error checking calendar"), "{text}");
        }
        other => panic!("expected one diagnostic, got {other:?}"),
    }
    assert!(!dir.path().join("cursor.json").exists());
}
