//! Event-type classification of calendar summaries.

use crate::config::{HeraldConfig, IGNORED_ROLE};
use crate::error::{HeraldError, Result};
use regex::{Regex, RegexBuilder};

/// What to do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Consume the event without posting.
    Ignore,
    /// Announce to `channel`, mentioning `mention`.
    Announce {
        /// Rendered mention (`<@&id>`, `@here`).
        mention: String,
        /// Channel id.
        channel: String,
    },
}

/// Result of matching one summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Tag of the first matching rule, `None` when no rule matched.
    pub tag: Option<String>,
    /// Resolved action.
    pub action: Action,
}

#[derive(Debug)]
struct CompiledRule {
    tag: String,
    pattern: Regex,
    action: Action,
}

/// Ordered rules plus the fallback for unmatched events.
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
    fallback: Action,
}

impl Classifier {
    /// Compile `[[calendar.rules]]` and resolve their channels and roles.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] for bad patterns or unknown names.
    pub fn from_config(config: &HeraldConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.calendar.rules.len());
        for rule in &config.calendar.rules {
            let pattern = RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| HeraldError::Config(format!("calendar rule '{}': {e}", rule.tag)))?;
            let action = if rule.role == IGNORED_ROLE {
                Action::Ignore
            } else {
                Action::Announce {
                    mention: config.mention_for(&rule.role)?,
                    channel: config.channel_id(&rule.channel)?.to_owned(),
                }
            };
            rules.push(CompiledRule {
                tag: rule.tag.clone(),
                pattern,
                action,
            });
        }
        let fallback = Action::Announce {
            mention: config.mention_for(&config.calendar.default_role)?,
            channel: config.channel_id(&config.calendar.default_channel)?.to_owned(),
        };
        Ok(Self { rules, fallback })
    }

    /// First matching rule wins; unmatched summaries get the fallback.
    #[must_use]
    pub fn classify(&self, summary: &str) -> Classification {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(summary))
            .map_or_else(
                || Classification {
                    tag: None,
                    action: self.fallback.clone(),
                },
                |rule| Classification {
                    tag: Some(rule.tag.clone()),
                    action: rule.action.clone(),
                },
            )
    }
}
