//! Discord REST delivery.

use super::rate_limit::ChannelRateLimiters;
use super::{Embed, Notifier};
use crate::config::DiscordConfig;
use crate::error::{HeraldError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;

/// Posts messages with a bot token through `POST /channels/{id}/messages`.
pub struct DiscordNotifier {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
    limiters: Mutex<ChannelRateLimiters>,
}

impl DiscordNotifier {
    /// Build a notifier from the `[discord]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] if the bot token is empty and
    /// [`HeraldError::Notify`] if the HTTP client cannot be built.
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(HeraldError::Config("discord bot token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HeraldError::Notify(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client,
            limiters: Mutex::new(ChannelRateLimiters::new(config.rate_limit_per_minute)),
        })
    }

    async fn wait_for_slot(&self, channel: &str) {
        loop {
            let wait = match self.limiters.lock().await.try_send(channel) {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(channel, wait_ms = wait.as_millis() as u64, "rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    fn messages_url(&self, channel: &str) -> String {
        format!("{}/channels/{channel}/messages", self.api_base)
    }

    async fn send(&self, channel: &str, request: reqwest::RequestBuilder) -> Result<()> {
        self.wait_for_slot(channel).await;
        let response = request
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|e| HeraldError::Notify(format!("discord send to {channel} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(HeraldError::Notify(format!(
                "discord send to {channel} failed ({status}): {body}"
            )));
        }
        Ok(())
    }
}

fn allowed_mentions() -> Value {
    json!({ "parse": ["roles", "everyone"] })
}

fn with_mention(mention: Option<&str>, text: &str) -> String {
    match mention {
        Some(m) => format!("{m}\n{text}"),
        None => text.to_owned(),
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn post_report(&self, channel: &str, mention: Option<&str>, text: &str) -> Result<()> {
        let body = json!({
            "content": with_mention(mention, text),
            "allowed_mentions": allowed_mentions(),
        });
        let request = self.client.post(self.messages_url(channel)).json(&body);
        self.send(channel, request).await
    }

    async fn post_file(
        &self,
        channel: &str,
        mention: Option<&str>,
        caption: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let content = match mention {
            Some(m) => format!("{m} {caption}"),
            None => caption.to_owned(),
        };
        let payload = json!({
            "content": content,
            "allowed_mentions": allowed_mentions(),
            "attachments": [{ "id": 0, "filename": filename }],
        });
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", Part::bytes(bytes).file_name(filename.to_owned()));
        let request = self.client.post(self.messages_url(channel)).multipart(form);
        self.send(channel, request).await
    }

    async fn post_announcement(&self, channel: &str, mention: &str, embed: &Embed) -> Result<()> {
        let body = json!({
            "content": mention,
            "embeds": [embed],
            "allowed_mentions": allowed_mentions(),
        });
        let request = self.client.post(self.messages_url(channel)).json(&body);
        self.send(channel, request).await
    }
}
