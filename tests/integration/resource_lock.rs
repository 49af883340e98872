//! Guarded sync repository checks never overlap.

use crate::helpers::{RecordingNotifier, routing};
use async_trait::async_trait;
use herald::detect::{SyncRepoDetector, SyncRepoSource};
use herald::error::{HeraldError, Result};
use herald::lock::{LockOutcome, ResourceLock};
use herald::store::SnapshotStore;
use herald::tasking::check_sync_repo;
use herald_sources::RepoMetadata;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Repository whose fetch parks until released.
struct SlowRepo {
    entered: Notify,
    release: Notify,
    fetches: AtomicUsize,
}

#[async_trait]
impl SyncRepoSource for SlowRepo {
    async fn fetch(&self) -> Result<RepoMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(RepoMetadata {
            revision: 3,
            total_size_bytes: 1,
            changelogs: BTreeMap::new(),
        })
    }
}

#[tokio::test]
async fn concurrent_checks_run_once_and_release_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(dir.path()));
    let repo = Arc::new(SlowRepo {
        entered: Notify::new(),
        release: Notify::new(),
        fetches: AtomicUsize::new(0),
    });
    let detector = Arc::new(SyncRepoDetector::new(Arc::clone(&repo)));
    let notifier = Arc::new(RecordingNotifier::default());
    let lock = ResourceLock::new();

    let first = {
        let (detector, store, notifier, lock) = (
            Arc::clone(&detector),
            Arc::clone(&store),
            Arc::clone(&notifier),
            lock.clone(),
        );
        tokio::spawn(async move {
            check_sync_repo(detector.as_ref(), &store, &lock, notifier.as_ref(), &routing()).await
        })
    };
    repo.entered.notified().await;
    assert!(lock.is_held());

    check_sync_repo(detector.as_ref(), &store, &lock, notifier.as_ref(), &routing())
        .await
        .unwrap();
    assert_eq!(repo.fetches.load(Ordering::SeqCst), 1);

    repo.release.notify_one();
    first.await.unwrap().unwrap();
    assert!(!lock.is_held());
    assert!(notifier.take().is_empty(), "first sight is silent");
}

#[tokio::test]
async fn lock_is_free_again_after_a_failed_operation() {
    let lock = ResourceLock::new();
    let failed: LockOutcome<()> = lock
        .try_acquire_and_run("sync-repo check", || async {
            Err(HeraldError::Network("timeout".into()))
        })
        .await;
    assert!(matches!(failed, LockOutcome::Failed(HeraldError::Network(_))));

    let next = lock
        .try_acquire_and_run("sync-repo check", || async { Ok("ran") })
        .await;
    assert!(matches!(next, LockOutcome::Completed("ran")));
}
