//! Steam workshop lookups: collection children, published file details and
//! changelog page scraping.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::http;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

/// Public Steam Web API root.
pub const STEAM_API_BASE: &str = "https://api.steampowered.com";

/// Public Steam community root (changelog pages).
pub const STEAM_COMMUNITY_BASE: &str = "https://steamcommunity.com";

/// `filetype` value Steam uses for a regular workshop item.
const FILETYPE_ITEM: u32 = 0;

/// `filetype` value Steam uses for a nested collection.
const FILETYPE_COLLECTION: u32 = 2;

/// What a collection child refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// A workshop item (mod).
    Item,
    /// Another collection.
    Collection,
    /// Anything else (screenshots, guides); ignored by callers.
    Other,
}

/// One child entry of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChild {
    /// Published file id of the child.
    pub id: String,
    /// Child kind.
    pub kind: ChildKind,
}

/// Metadata of one published workshop file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    /// Published file id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Unix timestamp of the last update.
    pub time_updated: i64,
}

#[derive(Deserialize)]
struct CollectionEnvelope {
    response: CollectionResponse,
}

#[derive(Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    collectiondetails: Vec<CollectionDetails>,
}

#[derive(Deserialize)]
struct CollectionDetails {
    #[serde(default)]
    children: Vec<RawChild>,
}

#[derive(Deserialize)]
struct RawChild {
    publishedfileid: String,
    filetype: u32,
}

#[derive(Deserialize)]
struct FileEnvelope {
    response: FileResponse,
}

#[derive(Deserialize)]
struct FileResponse {
    #[serde(default)]
    publishedfiledetails: Vec<RawFile>,
}

#[derive(Deserialize)]
struct RawFile {
    publishedfileid: String,
    #[serde(default)]
    result: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    time_updated: Option<i64>,
}

/// Client for the `ISteamRemoteStorage` endpoints and changelog pages.
pub struct WorkshopClient {
    client: reqwest::Client,
    api_base: String,
    community_base: String,
}

impl WorkshopClient {
    /// Create a client against the public Steam endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http::build_client(config)?,
            api_base: STEAM_API_BASE.to_owned(),
            community_base: STEAM_COMMUNITY_BASE.to_owned(),
        })
    }

    /// Override the Web API root.
    #[must_use]
    pub fn with_api_base(mut self, base: impl AsRef<str>) -> Self {
        self.api_base = http::trim_base(base.as_ref());
        self
    }

    /// Override the community root.
    #[must_use]
    pub fn with_community_base(mut self, base: impl AsRef<str>) -> Self {
        self.community_base = http::trim_base(base.as_ref());
        self
    }

    /// Public changelog page of an item.
    pub fn changelog_url(&self, id: &str) -> String {
        format!(
            "{}/sharedfiles/filedetails/changelog/{id}",
            self.community_base
        )
    }

    /// List the direct children of one collection.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or payload failures.
    pub async fn collection_children(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CollectionChild>, SourceError> {
        let url = format!(
            "{}/ISteamRemoteStorage/GetCollectionDetails/v1/",
            self.api_base
        );
        let form = [
            ("collectioncount".to_owned(), "1".to_owned()),
            ("publishedfileids[0]".to_owned(), collection_id.to_owned()),
        ];
        let body = self.post_form(&url, &form).await?;
        let envelope: CollectionEnvelope = serde_json::from_str(&body).map_err(|e| {
            SourceError::Parse(format!("collection details for {collection_id}: {e}"))
        })?;

        Ok(envelope
            .response
            .collectiondetails
            .into_iter()
            .flat_map(|details| details.children)
            .map(|child| CollectionChild {
                kind: match child.filetype {
                    FILETYPE_ITEM => ChildKind::Item,
                    FILETYPE_COLLECTION => ChildKind::Collection,
                    _ => ChildKind::Other,
                },
                id: child.publishedfileid,
            })
            .collect())
    }

    /// Fetch metadata for a batch of items. Items Steam reports as missing
    /// (`result != 1`) are left out.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or payload failures.
    pub async fn published_file_details(
        &self,
        ids: &[String],
    ) -> Result<Vec<PublishedFile>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/ISteamRemoteStorage/GetPublishedFileDetails/v1/",
            self.api_base
        );
        let mut form = Vec::with_capacity(ids.len() + 1);
        form.push(("itemcount".to_owned(), ids.len().to_string()));
        for (i, id) in ids.iter().enumerate() {
            form.push((format!("publishedfileids[{i}]"), id.clone()));
        }

        let body = self.post_form(&url, &form).await?;
        let envelope: FileEnvelope = serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("published file details: {e}")))?;

        let mut files = Vec::with_capacity(envelope.response.publishedfiledetails.len());
        for raw in envelope.response.publishedfiledetails {
            if raw.result != 1 {
                tracing::debug!(id = %raw.publishedfileid, result = raw.result, "workshop item unavailable");
                continue;
            }
            let time_updated = raw.time_updated.ok_or_else(|| {
                SourceError::Parse(format!(
                    "item {} has no time_updated",
                    raw.publishedfileid
                ))
            })?;
            files.push(PublishedFile {
                title: raw.title.unwrap_or_else(|| raw.publishedfileid.clone()),
                id: raw.publishedfileid,
                time_updated,
            });
        }
        Ok(files)
    }

    /// Scrape the newest changelog entry of an item.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the page cannot be fetched or has no
    /// changelog entry.
    pub async fn changelog_excerpt(&self, id: &str) -> Result<String, SourceError> {
        let url = self.changelog_url(id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("changelog request for {id} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(response).await);
        }
        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Http(format!("changelog read for {id} failed: {e}")))?;
        parse_changelog_html(&html)
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String, SourceError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("Steam request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(response).await);
        }
        response
            .text()
            .await
            .map_err(|e| SourceError::Http(format!("Steam response read failed: {e}")))
    }
}

/// Extract the text of the paragraph following the first changelog headline.
///
/// Line breaks inside the paragraph become `\n`.
pub(crate) fn parse_changelog_html(html: &str) -> Result<String, SourceError> {
    let document = Html::parse_document(html);
    let headline_sel = Selector::parse("div.changelog.headline")
        .map_err(|e| SourceError::Parse(format!("invalid headline selector: {e:?}")))?;

    let headline = document
        .select(&headline_sel)
        .next()
        .ok_or_else(|| SourceError::Parse("no changelog headline on page".into()))?;

    let paragraph = headline
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .ok_or_else(|| SourceError::Parse("changelog headline has no entry".into()))?;

    let lines: Vec<&str> = paragraph
        .text()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(lines.join("\n"))
}
