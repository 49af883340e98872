//! Upstream lookups the detectors depend on, implemented by the
//! `herald-sources` clients.

use crate::error::Result;
use async_trait::async_trait;
use herald_sources::{
    CollectionChild, PublishedFile, ReleaseFeedClient, ReleaseLookup, RepoMetadata,
    SyncRepoClient, WorkshopClient,
};
use std::sync::Arc;

/// Conditional latest-release lookup.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Latest release of `repo`, or not-modified since `if_modified_since`.
    async fn latest_release(
        &self,
        repo: &str,
        if_modified_since: Option<&str>,
    ) -> Result<ReleaseLookup>;

    /// Human-readable page of a release.
    fn release_page_url(&self, repo: &str, tag: &str) -> String;
}

#[async_trait]
impl ReleaseSource for ReleaseFeedClient {
    async fn latest_release(
        &self,
        repo: &str,
        if_modified_since: Option<&str>,
    ) -> Result<ReleaseLookup> {
        Ok(ReleaseFeedClient::latest_release(self, repo, if_modified_since).await?)
    }

    fn release_page_url(&self, repo: &str, tag: &str) -> String {
        ReleaseFeedClient::release_page_url(self, repo, tag)
    }
}

/// Workshop collection and item lookups.
#[async_trait]
pub trait WorkshopSource: Send + Sync {
    /// Direct children of a collection.
    async fn collection_children(&self, collection_id: &str) -> Result<Vec<CollectionChild>>;

    /// Metadata for a batch of items.
    async fn published_file_details(&self, ids: &[String]) -> Result<Vec<PublishedFile>>;

    /// Newest changelog entry of an item.
    async fn changelog_excerpt(&self, id: &str) -> Result<String>;

    /// Public changelog page of an item.
    fn changelog_url(&self, id: &str) -> String;
}

#[async_trait]
impl WorkshopSource for WorkshopClient {
    async fn collection_children(&self, collection_id: &str) -> Result<Vec<CollectionChild>> {
        Ok(WorkshopClient::collection_children(self, collection_id).await?)
    }

    async fn published_file_details(&self, ids: &[String]) -> Result<Vec<PublishedFile>> {
        Ok(WorkshopClient::published_file_details(self, ids).await?)
    }

    async fn changelog_excerpt(&self, id: &str) -> Result<String> {
        Ok(WorkshopClient::changelog_excerpt(self, id).await?)
    }

    fn changelog_url(&self, id: &str) -> String {
        WorkshopClient::changelog_url(self, id)
    }
}

/// Sync repository metadata lookup.
#[async_trait]
pub trait SyncRepoSource: Send + Sync {
    /// Current revision, size and changelogs.
    async fn fetch(&self) -> Result<RepoMetadata>;
}

#[async_trait]
impl SyncRepoSource for SyncRepoClient {
    async fn fetch(&self) -> Result<RepoMetadata> {
        Ok(SyncRepoClient::fetch(self).await?)
    }
}

#[async_trait]
impl<T: ReleaseSource + ?Sized> ReleaseSource for Arc<T> {
    async fn latest_release(
        &self,
        repo: &str,
        if_modified_since: Option<&str>,
    ) -> Result<ReleaseLookup> {
        (**self).latest_release(repo, if_modified_since).await
    }

    fn release_page_url(&self, repo: &str, tag: &str) -> String {
        (**self).release_page_url(repo, tag)
    }
}

#[async_trait]
impl<T: WorkshopSource + ?Sized> WorkshopSource for Arc<T> {
    async fn collection_children(&self, collection_id: &str) -> Result<Vec<CollectionChild>> {
        (**self).collection_children(collection_id).await
    }

    async fn published_file_details(&self, ids: &[String]) -> Result<Vec<PublishedFile>> {
        (**self).published_file_details(ids).await
    }

    async fn changelog_excerpt(&self, id: &str) -> Result<String> {
        (**self).changelog_excerpt(id).await
    }

    fn changelog_url(&self, id: &str) -> String {
        (**self).changelog_url(id)
    }
}

#[async_trait]
impl<T: SyncRepoSource + ?Sized> SyncRepoSource for Arc<T> {
    async fn fetch(&self) -> Result<RepoMetadata> {
        (**self).fetch().await
    }
}
