//! Shared test utilities used across multiple test modules.

use crate::error::{HeraldError, Result};
use crate::notify::{Embed, Notifier};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One captured notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posted {
    Report {
        channel: String,
        mention: Option<String>,
        text: String,
    },
    File {
        channel: String,
        mention: Option<String>,
        caption: String,
        filename: String,
        bytes: Vec<u8>,
    },
    Announcement {
        channel: String,
        mention: String,
        embed: Embed,
    },
}

/// Notifier that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<Posted>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Posted> {
        std::mem::take(&mut *self.posted.lock().expect("posted lock"))
    }

    pub fn len(&self) -> usize {
        self.posted.lock().expect("posted lock").len()
    }

    /// Make subsequent posts fail with [`HeraldError::Notify`].
    pub fn fail_posts(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, posted: Posted) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HeraldError::Notify("transport down".into()));
        }
        self.posted.lock().expect("posted lock").push(posted);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_report(&self, channel: &str, mention: Option<&str>, text: &str) -> Result<()> {
        self.record(Posted::Report {
            channel: channel.into(),
            mention: mention.map(str::to_owned),
            text: text.into(),
        })
    }

    async fn post_file(
        &self,
        channel: &str,
        mention: Option<&str>,
        caption: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.record(Posted::File {
            channel: channel.into(),
            mention: mention.map(str::to_owned),
            caption: caption.into(),
            filename: filename.into(),
            bytes,
        })
    }

    async fn post_announcement(&self, channel: &str, mention: &str, embed: &Embed) -> Result<()> {
        self.record(Posted::Announcement {
            channel: channel.into(),
            mention: mention.into(),
            embed: embed.clone(),
        })
    }
}
