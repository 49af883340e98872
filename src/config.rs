//! Configuration for the herald tasking engine.
//!
//! Loaded once from TOML at startup and immutable afterwards. Channels and
//! roles are referenced by short name everywhere else in the file and
//! resolved to platform ids through the `[channels]` and `[roles]` tables.

use crate::error::{HeraldError, Result};
use chrono::Weekday;
use herald_sources::SourcesConfig;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Role name that suppresses announcement of matching calendar events.
pub const IGNORED_ROLE: &str = "ignored";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// GitHub token. Usually supplied through `GITHUB_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    /// Messaging transport settings.
    pub discord: DiscordConfig,
    /// Channel name → channel id.
    pub channels: BTreeMap<String, String>,
    /// Role name → role id.
    pub roles: BTreeMap<String, String>,
    /// Where change reports and diagnostics go.
    pub reports: ReportsConfig,
    /// Shared HTTP settings for upstream clients.
    pub http: HttpConfig,
    /// Calendar polling and announcement rules.
    pub calendar: CalendarConfig,
    /// Mod name → GitHub `owner/repo`.
    pub release_feeds: BTreeMap<String, String>,
    /// Steam workshop collection root.
    pub workshop: WorkshopConfig,
    /// File-sync repository.
    pub sync_repo: SyncRepoConfig,
    /// Scheduled-activities API used to enrich primary announcements.
    pub activities: ActivitiesConfig,
    /// Task intervals.
    pub schedule: ScheduleConfig,
    /// Recruitment reminder.
    pub recruitment: RecruitmentConfig,
}

/// Discord REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied through `DISCORD_TOKEN`.
    pub bot_token: String,
    /// REST API root.
    pub api_base: String,
    /// Maximum messages per channel per minute.
    pub rate_limit_per_minute: u32,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://discord.com/api/v10".to_owned(),
            rate_limit_per_minute: 20,
        }
    }
}

/// Routing of change reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Channel receiving mod update reports.
    pub staff_channel: String,
    /// Role mentioned on mod update reports.
    pub admin_role: String,
    /// Channel receiving sync repository reports.
    pub announcements_channel: String,
    /// Operator-only channel for failures and lifecycle notices.
    pub diagnostics_channel: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            staff_channel: "staff".to_owned(),
            admin_role: "admin".to_owned(),
            announcements_channel: "announcements".to_owned(),
            diagnostics_channel: "diagnostics".to_owned(),
        }
    }
}

/// HTTP behaviour of upstream clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent (None = crate default).
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    /// Settings handed to `herald-sources` clients.
    #[must_use]
    pub fn sources_config(&self) -> SourcesConfig {
        let mut config = SourcesConfig {
            timeout_seconds: self.timeout_seconds,
            ..Default::default()
        };
        if let Some(ua) = &self.user_agent {
            config.user_agent.clone_from(ua);
        }
        config
    }
}

/// One event-type rule. Rules are evaluated in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRule {
    /// Classification tag (e.g. `main`, `training`).
    pub tag: String,
    /// Regex matched case-insensitively against the event summary.
    pub pattern: String,
    /// Role to mention, `here`, or [`IGNORED_ROLE`].
    pub role: String,
    /// Channel name. Unused for ignored rules.
    #[serde(default)]
    pub channel: String,
}

/// Calendar polling and announcement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Provider calendar id.
    pub calendar_id: String,
    /// OAuth access token. Usually supplied through `CALENDAR_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Override of the provider API root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Channel for events no rule matches.
    pub default_channel: String,
    /// Mention for events no rule matches.
    pub default_role: String,
    /// Earliest advance notice, in minutes before start.
    pub lead_max_minutes: i64,
    /// Latest advance notice, in minutes before start.
    pub lead_min_minutes: i64,
    /// Offset of the "starting" notice, in minutes before start.
    pub start_notice_minutes: i64,
    /// Ordered classification rules.
    pub rules: Vec<CalendarRule>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: String::new(),
            access_token: None,
            api_base: None,
            default_channel: "op_news".to_owned(),
            default_role: "here".to_owned(),
            lead_max_minutes: 60,
            lead_min_minutes: 10,
            start_notice_minutes: 5,
            rules: Vec::new(),
        }
    }
}

/// Steam workshop settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkshopConfig {
    /// Root collection id (empty = workshop checks disabled).
    pub collection_id: String,
    /// Override of the Steam Web API root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Override of the Steam community root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_base: Option<String>,
}

/// File-sync repository settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncRepoConfig {
    /// Metadata document URL (empty = sync repo checks disabled).
    pub metadata_url: String,
}

/// Scheduled-activities API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitiesConfig {
    /// API root (empty = enrichment disabled).
    pub api_base: String,
    /// Bearer token. Usually supplied through `ACTIVITIES_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Prefix of activity links; the activity id is appended.
    pub link_base: String,
    /// Classification tag whose advance notice lists the activities.
    pub enrich_tag: String,
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            token: None,
            link_base: "https://arcomm.co.uk/hub/missions".to_owned(),
            enrich_tag: "main".to_owned(),
        }
    }
}

/// Task intervals and start offsets, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Calendar poll interval.
    pub calendar_interval_secs: u64,
    /// Release feed + workshop check interval.
    pub mod_check_interval_secs: u64,
    /// Sync repository check interval.
    pub sync_repo_interval_secs: u64,
    /// Delay before the first sync repository check.
    pub sync_repo_start_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            calendar_interval_secs: 60,
            mod_check_interval_secs: 3600,
            sync_repo_interval_secs: 600,
            sync_repo_start_delay_secs: 5,
        }
    }
}

impl ScheduleConfig {
    /// Calendar poll interval.
    #[must_use]
    pub fn calendar_interval(&self) -> Duration {
        Duration::from_secs(self.calendar_interval_secs)
    }

    /// Mod check interval.
    #[must_use]
    pub fn mod_check_interval(&self) -> Duration {
        Duration::from_secs(self.mod_check_interval_secs)
    }

    /// Sync repository interval.
    #[must_use]
    pub fn sync_repo_interval(&self) -> Duration {
        Duration::from_secs(self.sync_repo_interval_secs)
    }
}

/// Recruitment reminder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruitmentConfig {
    /// Whether the reminder task is registered.
    pub enabled: bool,
    /// File attached to the reminder.
    pub post_file: std::path::PathBuf,
    /// Reminder text; the admin mention is prepended.
    pub message: String,
    /// UTC hour of the reminder.
    pub hour: u32,
    /// UTC minute of the reminder.
    pub minute: u32,
    /// Days the reminder is posted on.
    pub weekdays: Vec<Weekday>,
}

impl Default for RecruitmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            post_file: crate::herald_dirs::config_dir().join("recruit_post.md"),
            message: "Post recruitment on <https://www.reddit.com/r/FindAUnit>".to_owned(),
            hour: 17,
            minute: 0,
            weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        }
    }
}

impl HeraldConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HeraldError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HeraldError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill secrets from `DISCORD_TOKEN`, `GITHUB_TOKEN`, `CALENDAR_TOKEN`
    /// and `ACTIVITIES_TOKEN` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get("DISCORD_TOKEN") {
            self.discord.bot_token = token;
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.github_token = Some(token);
        }
        if let Some(token) = get("CALENDAR_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(token) = get("ACTIVITIES_TOKEN") {
            self.activities.token = Some(token);
        }
    }

    /// Check cross references and compile every calendar rule.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_seconds == 0 {
            return Err(HeraldError::Config(
                "http.timeout_seconds must be greater than 0".into(),
            ));
        }
        for (name, secs) in [
            ("calendar_interval_secs", self.schedule.calendar_interval_secs),
            ("mod_check_interval_secs", self.schedule.mod_check_interval_secs),
            ("sync_repo_interval_secs", self.schedule.sync_repo_interval_secs),
        ] {
            if secs == 0 {
                return Err(HeraldError::Config(format!(
                    "schedule.{name} must be greater than 0"
                )));
            }
        }

        let cal = &self.calendar;
        if !(0 <= cal.start_notice_minutes
            && cal.start_notice_minutes <= cal.lead_min_minutes
            && cal.lead_min_minutes <= cal.lead_max_minutes)
        {
            return Err(HeraldError::Config(
                "calendar requires 0 <= start_notice_minutes <= lead_min_minutes <= lead_max_minutes"
                    .into(),
            ));
        }

        self.channel_id(&self.reports.staff_channel)?;
        self.channel_id(&self.reports.announcements_channel)?;
        self.channel_id(&self.reports.diagnostics_channel)?;
        self.mention_for(&self.reports.admin_role)?;
        self.channel_id(&cal.default_channel)?;
        self.mention_for(&cal.default_role)?;

        for rule in &cal.rules {
            RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    HeraldError::Config(format!("calendar rule '{}': {e}", rule.tag))
                })?;
            if rule.role == IGNORED_ROLE {
                continue;
            }
            self.mention_for(&rule.role)?;
            self.channel_id(&rule.channel)?;
        }

        let rec = &self.recruitment;
        if rec.enabled && (rec.hour > 23 || rec.minute > 59) {
            return Err(HeraldError::Config(format!(
                "recruitment time {:02}:{:02} is not a valid time of day",
                rec.hour, rec.minute
            )));
        }
        Ok(())
    }

    /// Resolve a channel name to its id.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] for unknown names.
    pub fn channel_id(&self, name: &str) -> Result<&str> {
        self.channels
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| HeraldError::Config(format!("unknown channel '{name}'")))
    }

    /// Resolve a role name to a mention string. `here` and `everyone` map
    /// to the platform-wide mentions.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] for unknown names.
    pub fn mention_for(&self, role: &str) -> Result<String> {
        match role {
            "here" => Ok("@here".to_owned()),
            "everyone" => Ok("@everyone".to_owned()),
            name => self
                .roles
                .get(name)
                .map(|id| format!("<@&{id}>"))
                .ok_or_else(|| HeraldError::Config(format!("unknown role '{name}'"))),
        }
    }
}
