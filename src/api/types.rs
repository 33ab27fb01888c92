// Dashboard API types.
// Request and response bodies for guilds, feeds, schedules, stored summaries, prompts and health.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Discord guild the bot is installed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    pub icon_url: Option<String>,
    pub member_count: Option<u64>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    pub config: Option<GuildConfig>,
}

/// Text channel of a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub channel_type: Option<String>,
    pub category: Option<String>,
}

/// Per-guild bot configuration. Unknown fields are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    #[serde(default)]
    pub enabled_channels: Vec<String>,
    #[serde(default)]
    pub excluded_channels: Vec<String>,
    pub default_summary_options: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial guild configuration update. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateGuildConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_channels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_channels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_summary_options: Option<Value>,
}

/// Result of a channel sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSyncResult {
    pub channels: Vec<Channel>,
    pub added: u64,
    pub removed: u64,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Syndication feed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedType {
    #[default]
    Rss,
    Atom,
    #[serde(other)]
    Unknown,
}

/// RSS/Atom feed of a guild's summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub guild_id: String,
    /// Restricts the feed to one channel; None covers the whole guild.
    pub channel_id: Option<String>,
    #[serde(default)]
    pub feed_type: FeedType,
    #[serde(default)]
    pub is_public: bool,
    pub url: Option<String>,
    pub token: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_items: Option<u32>,
    #[serde(default)]
    pub include_full_content: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateFeedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub feed_type: FeedType,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
    pub include_full_content: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateFeedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_type: Option<FeedType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_full_content: Option<bool>,
}

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Once,
    Daily,
    Weekly,
    HalfWeekly,
    Monthly,
    Custom,
    #[serde(other)]
    Unknown,
}

/// Recurring summary schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub guild_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub channel_ids: Vec<String>,
    pub schedule_type: ScheduleType,
    /// Local time of day, `HH:MM`.
    pub schedule_time: Option<String>,
    /// Weekdays for weekly schedules, 0 = Monday.
    #[serde(default)]
    pub schedule_days: Vec<u8>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    pub summary_options: Option<Value>,
    #[serde(default)]
    pub destinations: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub channel_ids: Vec<String>,
    pub schedule_type: ScheduleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule_days: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<ScheduleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_days: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_options: Option<Value>,
}

/// Response to running a schedule now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleRunResult {
    pub execution_id: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// One past execution of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary_id: Option<String>,
    pub error_message: Option<String>,
}

/// Where a stored summary came from. `All` is a list filter only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    #[default]
    All,
    Realtime,
    Scheduled,
    Manual,
    Archive,
    #[serde(other)]
    Unknown,
}

impl SummarySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarySource::All => "all",
            SummarySource::Realtime => "realtime",
            SummarySource::Scheduled => "scheduled",
            SummarySource::Manual => "manual",
            SummarySource::Archive => "archive",
            SummarySource::Unknown => "unknown",
        }
    }

    /// Value for the `source` list filter. `All` and unrecognised sources
    /// mean no filter.
    pub fn filter_value(&self) -> Option<&'static str> {
        match self {
            SummarySource::All | SummarySource::Unknown => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummarySource {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "all" => Ok(SummarySource::All),
            "realtime" => Ok(SummarySource::Realtime),
            "scheduled" => Ok(SummarySource::Scheduled),
            "manual" => Ok(SummarySource::Manual),
            "archive" => Ok(SummarySource::Archive),
            other => Err(SyncError::Other(format!("unknown summary source '{}'", other))),
        }
    }
}

/// Generated summary kept by the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: String,
    pub guild_id: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_channel_ids: Vec<String>,
    pub summary_text: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: SummarySource,
    pub schedule_id: Option<String>,
}

/// One page of stored summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummaryPage {
    #[serde(alias = "summaries")]
    pub items: Vec<StoredSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    pub limit: Option<u32>,
}

fn first_page() -> u32 {
    1
}

/// Filters for the stored summaries list. Unset filters are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoredSummaryFilter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub tags: Vec<String>,
    pub source: SummarySource,
}

impl StoredSummaryFilter {
    /// Query-string pairs: tags are comma-joined, `all` and unknown sources are omitted.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(pinned) = self.pinned {
            params.push(("pinned", pinned.to_string()));
        }
        if let Some(archived) = self.archived {
            params.push(("archived", archived.to_string()));
        }
        if !self.tags.is_empty() {
            params.push(("tags", self.tags.join(",")));
        }
        if let Some(source) = self.source.filter_value() {
            params.push(("source", source.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStoredSummaryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushSummaryRequest {
    pub channel_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_references: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSummaryResult {
    pub success: bool,
    pub total_channels: u64,
    pub successful_channels: u64,
    pub deliveries: Vec<Value>,
}

/// Built-in prompt template for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultPrompt {
    pub category: String,
    pub name: Option<String>,
    pub content: String,
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Server health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: Option<String>,
    pub uptime_seconds: Option<u64>,
    #[serde(default)]
    pub services: BTreeMap<String, Value>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "healthy")
    }
}
