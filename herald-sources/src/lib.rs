//! # herald-sources
//!
//! HTTP clients for the upstream feeds herald watches.
//!
//! Each client wraps one external API and returns typed payloads; none of
//! them keep state between calls. Change detection, persistence and
//! notification live in the `herald` crate.
//!
//! ## Clients
//!
//! - [`ReleaseFeedClient`]: GitHub latest release with `If-Modified-Since`
//! - [`WorkshopClient`]: Steam collection children, file details and changelog pages
//! - [`SyncRepoClient`]: file-sync repository metadata document
//! - [`CalendarClient`]: calendar events listing windowed by start time
//! - [`ActivityClient`]: activities scheduled for the next session
//!
//! ## Security
//!
//! - Tokens are sent only as `Authorization` headers and never logged
//! - Error messages carry at most 200 characters of a response body

pub mod activities;
pub mod calendar;
pub mod config;
pub mod error;
pub mod github;
pub mod http;
pub mod sync_repo;
pub mod workshop;

pub use activities::{Activity, ActivityClient};
pub use calendar::{CalendarClient, RemoteEvent};
pub use config::SourcesConfig;
pub use error::{Result, SourceError};
pub use github::{Release, ReleaseFeedClient, ReleaseLookup};
pub use sync_repo::{RepoMetadata, RevisionChangelog, SyncRepoClient};
pub use workshop::{ChildKind, CollectionChild, PublishedFile, WorkshopClient};
