//! Outbound notifications.
//!
//! The tasking engine only decides *what* to post and *where*; delivery is
//! behind the [`Notifier`] trait. [`DiscordNotifier`] posts through the
//! Discord REST API and [`LogNotifier`] writes to the log for dry runs.

pub mod discord;
pub mod rate_limit;

pub use discord::DiscordNotifier;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Longest text posted inline; longer reports go out as a file.
pub const INLINE_TEXT_LIMIT: usize = 1950;

/// Embed accent colour (dark red).
pub const EMBED_COLOUR: u32 = 0x992D22;

/// One embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    /// Field heading.
    pub name: String,
    /// Field body (markdown).
    pub value: String,
    /// Render side by side with neighbouring inline fields.
    pub inline: bool,
}

/// Structured announcement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    /// Heading.
    pub title: String,
    /// Body text.
    pub description: String,
    /// Accent colour as `0xRRGGBB`.
    #[serde(rename = "color")]
    pub colour: u32,
    /// Ordered fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// Embed with no fields.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            colour: EMBED_COLOUR,
            fields: Vec::new(),
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// Message delivery collaborator. Channel arguments are platform channel ids;
/// mentions are rendered mention strings (`<@&id>`, `@here`).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post plain text, prefixed by `mention` on its own line when given.
    async fn post_report(&self, channel: &str, mention: Option<&str>, text: &str) -> Result<()>;

    /// Post a file attachment with a caption.
    async fn post_file(
        &self,
        channel: &str,
        mention: Option<&str>,
        caption: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()>;

    /// Post an embed with a mention.
    async fn post_announcement(&self, channel: &str, mention: &str, embed: &Embed) -> Result<()>;
}

/// Post `text` inline, or as `filename` when the mention plus text would
/// exceed [`INLINE_TEXT_LIMIT`].
///
/// # Errors
///
/// Propagates the notifier's error.
pub async fn post_report_or_file(
    notifier: &dyn Notifier,
    channel: &str,
    mention: Option<&str>,
    text: &str,
    caption: &str,
    filename: &str,
) -> Result<()> {
    let inline_len = mention.map_or(0, |m| m.chars().count() + 1) + text.chars().count();
    if inline_len <= INLINE_TEXT_LIMIT {
        notifier.post_report(channel, mention, text).await
    } else {
        tracing::info!(channel, filename, chars = inline_len, "report too long, sending as file");
        let body = match mention {
            Some(m) => format!("{m}\n{text}"),
            None => text.to_owned(),
        };
        notifier
            .post_file(channel, mention, caption, filename, body.into_bytes())
            .await
    }
}

/// Writes every notification to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn post_report(&self, channel: &str, mention: Option<&str>, text: &str) -> Result<()> {
        tracing::info!(channel, ?mention, %text, "dry run: report");
        Ok(())
    }

    async fn post_file(
        &self,
        channel: &str,
        mention: Option<&str>,
        caption: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        tracing::info!(channel, ?mention, caption, filename, size = bytes.len(), "dry run: file");
        Ok(())
    }

    async fn post_announcement(&self, channel: &str, mention: &str, embed: &Embed) -> Result<()> {
        tracing::info!(channel, mention, title = %embed.title, fields = embed.fields.len(), "dry run: announcement");
        Ok(())
    }
}
