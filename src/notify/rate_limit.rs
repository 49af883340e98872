//! Per-channel sliding-window rate limiting for outbound messages.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding window over the last minute of sends for one channel.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_messages_per_minute: u32,
    window: VecDeque<Instant>,
}

impl RateLimiter {
    /// Limiter allowing `max_messages_per_minute` sends per rolling minute.
    #[must_use]
    pub fn new(max_messages_per_minute: u32) -> Self {
        Self {
            max_messages_per_minute: max_messages_per_minute.max(1),
            window: VecDeque::new(),
        }
    }

    /// Record a send if capacity allows; otherwise return how long to wait
    /// until the oldest send ages out.
    pub fn try_send(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        while let Some(&first) = self.window.front() {
            if now.duration_since(first) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= self.max_messages_per_minute as usize {
            if let Some(&oldest) = self.window.front() {
                return Err(WINDOW.saturating_sub(now.duration_since(oldest)));
            }
        }

        self.window.push_back(now);
        Ok(())
    }

    /// Sends left in the current window.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max_messages_per_minute
            .saturating_sub(self.window.len() as u32)
    }
}

/// Independent limiters keyed by channel id.
#[derive(Debug)]
pub struct ChannelRateLimiters {
    per_minute: u32,
    limiters: HashMap<String, RateLimiter>,
}

impl ChannelRateLimiters {
    /// Every channel gets `per_minute` sends per rolling minute.
    #[must_use]
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            limiters: HashMap::new(),
        }
    }

    /// Record a send on `channel`, or return the wait before retrying.
    pub fn try_send(&mut self, channel: &str) -> Result<(), Duration> {
        let per_minute = self.per_minute;
        self.limiters
            .entry(channel.to_owned())
            .or_insert_with(|| RateLimiter::new(per_minute))
            .try_send()
    }
}
