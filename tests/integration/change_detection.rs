//! Change detectors against real snapshot files: first sight, idempotence,
//! monotonic revisions and failure handling.

use crate::helpers::{Posted, RecordingNotifier, routing};
use async_trait::async_trait;
use herald::detect::{
    ChangeDetector, Detection, ReleaseFeedDetector, SyncRepoDetector, SyncRepoSource,
    WorkshopDetector, WorkshopSource, run_detector,
};
use herald::error::{HeraldError, Result};
use herald::store::{SnapshotStore, SourceFamily};
use herald::tasking::{MOD_UPDATE_FILENAME, check_mod_updates};
use herald_sources::{
    ChildKind, CollectionChild, PublishedFile, ReleaseFeedClient, RepoMetadata,
    RevisionChangelog, SourcesConfig,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LATEST: &str = "/repos/acemod/ACE3/releases/latest";
const MONDAY: &str = "Mon, 14 Oct 2024 10:00:00 GMT";
const TUESDAY: &str = "Tue, 15 Oct 2024 10:00:00 GMT";

async fn mount_release(server: &MockServer, tag: &str, last_modified: &str) {
    Mock::given(method("GET"))
        .and(path(LATEST))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", last_modified)
                .set_body_json(serde_json::json!({
                    "tag_name": tag,
                    "html_url": format!("https://github.com/acemod/ACE3/releases/tag/{tag}"),
                })),
        )
        .mount(server)
        .await;
}

async fn mount_not_modified(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LATEST))
        .and(header_exists("if-modified-since"))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .mount(server)
        .await;
}

fn release_detector(server: &MockServer) -> ReleaseFeedDetector<ReleaseFeedClient> {
    let client = ReleaseFeedClient::new(&SourcesConfig::default(), None)
        .unwrap()
        .with_api_base(server.uri());
    let feeds = BTreeMap::from([("ACE3".to_owned(), "acemod/ACE3".to_owned())]);
    ReleaseFeedDetector::new(client, feeds)
}

#[tokio::test]
async fn release_feed_reports_each_release_exactly_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let detector = release_detector(&server);

    mount_release(&server, "v3.16.0", MONDAY).await;
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);
    assert!(dir.path().join(SourceFamily::ReleaseFeed.file_name()).exists());

    mount_not_modified(&server).await;
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);

    server.reset().await;
    mount_release(&server, "v3.17.0", TUESDAY).await;
    match run_detector(&detector, &store).await {
        Detection::Changed { report } => {
            assert!(report.contains("**ACE3** has released a new version (v3.17.0)"), "{report}");
            assert!(report.contains("<https://github.com/acemod/ACE3/releases/tag/v3.17.0>"));
        }
        other => panic!("expected a report, got {other:?}"),
    }

    mount_not_modified(&server).await;
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);
}

#[tokio::test]
async fn release_feed_server_error_leaves_snapshot_alone() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let detector = release_detector(&server);

    mount_release(&server, "v3.16.0", MONDAY).await;
    run_detector(&detector, &store).await;
    let before = store.load(SourceFamily::ReleaseFeed).unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(LATEST))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    match run_detector(&detector, &store).await {
        Detection::Partial { report: None, errors } => {
            assert_eq!(errors.len(), 1);
            assert!(
                errors[0].starts_with("Error checking release-feed: ACE3 (acemod/ACE3)"),
                "{errors:?}"
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(store.load(SourceFamily::ReleaseFeed).unwrap(), before);
}

#[tokio::test]
async fn missing_repository_does_not_hide_other_releases() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let notifier = RecordingNotifier::default();
    let client = ReleaseFeedClient::new(&SourcesConfig::default(), None)
        .unwrap()
        .with_api_base(server.uri());
    let feeds = BTreeMap::from([
        ("ACE3".to_owned(), "acemod/ACE3".to_owned()),
        ("Zombie".to_owned(), "zombies/Zombie".to_owned()),
    ]);
    let detectors: Vec<Arc<dyn ChangeDetector>> =
        vec![Arc::new(ReleaseFeedDetector::new(client, feeds))];

    Mock::given(method("GET"))
        .and(path("/repos/zombies/Zombie/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_release(&server, "v3.16.0", MONDAY).await;
    check_mod_updates(&detectors, &store, &notifier, &routing())
        .await
        .unwrap();
    let posted = notifier.take();
    assert_eq!(posted.len(), 1);
    assert!(matches!(&posted[0], Posted::Report { channel, .. } if channel == "102"));

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/repos/zombies/Zombie/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_release(&server, "v3.17.0", TUESDAY).await;
    check_mod_updates(&detectors, &store, &notifier, &routing())
        .await
        .unwrap();

    let posted = notifier.take();
    assert_eq!(posted.len(), 2, "{posted:?}");
    match &posted[0] {
        Posted::Report { channel, text, .. } => {
            assert_eq!(channel, "102");
            assert!(text.contains("Zombie (zombies/Zombie)"), "{text}");
        }
        other => panic!("expected diagnostic, got {other:?}"),
    }
    match &posted[1] {
        Posted::Report { channel, text, .. } => {
            assert_eq!(channel, "100");
            assert!(text.contains("**ACE3** has released a new version (v3.17.0)"), "{text}");
        }
        other => panic!("expected staff report, got {other:?}"),
    }
}

struct Repo(Mutex<RepoMetadata>);

impl Repo {
    fn at(revision: u64, size: u64) -> Self {
        let repo = Self(Mutex::new(RepoMetadata {
            revision: 0,
            total_size_bytes: 0,
            changelogs: BTreeMap::new(),
        }));
        repo.publish(revision, size);
        repo
    }

    fn publish(&self, revision: u64, size: u64) {
        let mut meta = self.0.lock().unwrap();
        meta.revision = revision;
        meta.total_size_bytes = size;
        meta.changelogs.insert(
            revision,
            RevisionChangelog {
                revision,
                updated_addons: vec![format!("@addon_r{revision}")],
                new_addons: Vec::new(),
                deleted_addons: Vec::new(),
            },
        );
    }

    fn roll_back(&self, revision: u64) {
        self.0.lock().unwrap().revision = revision;
    }
}

#[async_trait]
impl SyncRepoSource for Repo {
    async fn fetch(&self) -> Result<RepoMetadata> {
        Ok(self.0.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn sync_repo_revision_only_moves_forward() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let repo = Arc::new(Repo::at(5, 40_000_000_000));
    let detector = SyncRepoDetector::new(Arc::clone(&repo));

    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);

    repo.publish(7, 41_250_000_000);
    let report = match run_detector(&detector, &store).await {
        Detection::Changed { report } => report,
        other => panic!("expected a report, got {other:?}"),
    };
    assert!(report.contains("[41.25 GB](+1.25 GB)"), "{report}");
    assert!(report.contains("@addon_r7"));

    repo.roll_back(6);
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);
    let record = store.load(SourceFamily::SyncRepo).unwrap();
    assert_eq!(
        record.get("repo").unwrap().revision.as_deref(),
        Some("7"),
        "a lower revision must not overwrite the stored one"
    );

    repo.roll_back(7);
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);
}

#[derive(Default)]
struct Workshop {
    collections: HashMap<String, Vec<CollectionChild>>,
    updated: Mutex<HashMap<String, i64>>,
    listed: Mutex<Vec<String>>,
}

impl Workshop {
    fn child(id: &str, kind: ChildKind) -> CollectionChild {
        CollectionChild {
            id: id.to_owned(),
            kind,
        }
    }

    fn bump(&self, id: &str, time_updated: i64) {
        self.updated.lock().unwrap().insert(id.to_owned(), time_updated);
    }
}

#[async_trait]
impl WorkshopSource for Workshop {
    async fn collection_children(&self, collection_id: &str) -> Result<Vec<CollectionChild>> {
        self.listed.lock().unwrap().push(collection_id.to_owned());
        self.collections
            .get(collection_id)
            .cloned()
            .ok_or_else(|| HeraldError::Network(format!("no collection {collection_id}")))
    }

    async fn published_file_details(&self, ids: &[String]) -> Result<Vec<PublishedFile>> {
        let updated = self.updated.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                updated.get(id).map(|t| PublishedFile {
                    id: id.clone(),
                    title: format!("Mod {id}"),
                    time_updated: *t,
                })
            })
            .collect())
    }

    async fn changelog_excerpt(&self, id: &str) -> Result<String> {
        if id == "broken" {
            return Err(HeraldError::Parse("no changelog block".into()));
        }
        Ok(format!("fixes for {id}\n"))
    }

    fn changelog_url(&self, id: &str) -> String {
        format!("https://steamcommunity.com/sharedfiles/filedetails/changelog/{id}")
    }
}

fn nested_workshop() -> Arc<Workshop> {
    let mut workshop = Workshop::default();
    workshop.collections.insert(
        "root".into(),
        vec![
            Workshop::child("a", ChildKind::Item),
            Workshop::child("inner", ChildKind::Collection),
            Workshop::child("screenshot", ChildKind::Other),
        ],
    );
    workshop.collections.insert(
        "inner".into(),
        vec![
            Workshop::child("b", ChildKind::Item),
            Workshop::child("a", ChildKind::Item),
            Workshop::child("broken", ChildKind::Item),
            Workshop::child("root", ChildKind::Collection),
        ],
    );
    for id in ["a", "b", "broken"] {
        workshop.bump(id, 100);
    }
    Arc::new(workshop)
}

#[tokio::test]
async fn workshop_expands_nested_collections_once_each() {
    let workshop = nested_workshop();
    let detector = WorkshopDetector::new(Arc::clone(&workshop), "root");

    let items: Vec<String> = detector.expand().await.unwrap().into_iter().collect();
    assert_eq!(items, vec!["a", "b", "broken"]);

    let mut listed = workshop.listed.lock().unwrap().clone();
    listed.sort();
    assert_eq!(listed, vec!["inner", "root"]);
}

#[tokio::test]
async fn workshop_reports_updated_items_with_changelog_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let workshop = nested_workshop();
    let detector = WorkshopDetector::new(Arc::clone(&workshop), "root");

    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);

    workshop.bump("b", 200);
    workshop.bump("broken", 300);
    let report = match run_detector(&detector, &store).await {
        Detection::Changed { report } => report,
        other => panic!("expected a report, got {other:?}"),
    };
    assert!(report.contains("**Mod b** has released a new version"), "{report}");
    assert!(report.contains("```\nfixes for b\n```"), "{report}");
    assert!(report.contains("**Mod broken** has released a new version"));
    assert!(report.contains(herald::detect::workshop::CHANGELOG_FALLBACK));
    assert!(!report.contains("**Mod a**"));

    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);
}

#[tokio::test]
async fn workshop_item_missing_from_details_is_still_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let workshop = nested_workshop();
    let detector = WorkshopDetector::new(Arc::clone(&workshop), "root");
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);

    workshop.updated.lock().unwrap().remove("b");
    assert_eq!(run_detector(&detector, &store).await, Detection::Unchanged);

    workshop.bump("b", 200);
    match run_detector(&detector, &store).await {
        Detection::Changed { report } => {
            assert!(report.contains("**Mod b** has released a new version"), "{report}");
        }
        other => panic!("expected a report, got {other:?}"),
    }
}

#[tokio::test]
async fn mod_check_posts_oversized_report_as_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let notifier = RecordingNotifier::default();

    let mut workshop = Workshop::default();
    let children: Vec<_> = (0..60)
        .map(|i| Workshop::child(&format!("item{i:02}"), ChildKind::Item))
        .collect();
    workshop.collections.insert("root".into(), children);
    for i in 0..60 {
        workshop.bump(&format!("item{i:02}"), 1);
    }
    let workshop = Arc::new(workshop);
    let detectors: Vec<Arc<dyn ChangeDetector>> =
        vec![Arc::new(WorkshopDetector::new(Arc::clone(&workshop), "root"))];

    check_mod_updates(&detectors, &store, &notifier, &routing())
        .await
        .unwrap();
    assert!(notifier.take().is_empty());

    for i in 0..60 {
        workshop.bump(&format!("item{i:02}"), 2);
    }
    check_mod_updates(&detectors, &store, &notifier, &routing())
        .await
        .unwrap();
    assert_eq!(
        notifier.take(),
        vec![Posted::File {
            channel: "100".into(),
            filename: MOD_UPDATE_FILENAME.into(),
        }]
    );
}
