// API path utilities.
// Builds REST paths for the dashboard resource hierarchy under the versioned API root.

use std::fmt;

use url::Url;

use crate::error::{Result, SyncError};

/// Path below a base URL, held as unescaped segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiPath(Vec<String>);

impl ApiPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one segment. Slashes and other reserved characters inside it are
    /// escaped when the path is resolved.
    pub fn push(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Split a slash-separated prefix such as `/api/v1`, ignoring empty parts.
    pub fn from_slashed(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Append the segments to `base`, percent-encoding each one.
    pub fn resolve(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("'{}' cannot be used as a base URL", base)))?
            .pop_if_empty()
            .extend(&self.0);
        Ok(url)
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Health check, served from the unversioned server root.
pub fn health_path() -> ApiPath {
    ApiPath::new().push("health")
}

/// Path to the guild list.
pub fn guilds_path() -> ApiPath {
    ApiPath::new().push("guilds")
}

/// Path to a guild.
pub fn guild_path(guild_id: &str) -> ApiPath {
    guilds_path().push(guild_id)
}

/// Path to a guild's configuration.
pub fn guild_config_path(guild_id: &str) -> ApiPath {
    guild_path(guild_id).push("config")
}

/// Path that triggers a channel sync for a guild.
pub fn channels_sync_path(guild_id: &str) -> ApiPath {
    guild_path(guild_id).push("channels").push("sync")
}

/// Path to a guild's feeds collection.
pub fn feeds_path(guild_id: &str) -> ApiPath {
    guild_path(guild_id).push("feeds")
}

/// Path to a feed.
pub fn feed_path(guild_id: &str, feed_id: &str) -> ApiPath {
    feeds_path(guild_id).push(feed_id)
}

/// Path that rotates a feed's access token.
pub fn feed_token_path(guild_id: &str, feed_id: &str) -> ApiPath {
    feed_path(guild_id, feed_id).push("regenerate-token")
}

/// Path to a guild's schedules collection.
pub fn schedules_path(guild_id: &str) -> ApiPath {
    guild_path(guild_id).push("schedules")
}

/// Path to a schedule.
pub fn schedule_path(guild_id: &str, schedule_id: &str) -> ApiPath {
    schedules_path(guild_id).push(schedule_id)
}

/// Path that runs a schedule immediately.
pub fn schedule_run_path(guild_id: &str, schedule_id: &str) -> ApiPath {
    schedule_path(guild_id, schedule_id).push("run")
}

/// Path to a schedule's execution history.
pub fn schedule_history_path(guild_id: &str, schedule_id: &str) -> ApiPath {
    schedule_path(guild_id, schedule_id).push("history")
}

/// Path to a guild's stored summaries collection.
pub fn stored_summaries_path(guild_id: &str) -> ApiPath {
    guild_path(guild_id).push("stored-summaries")
}

/// Path to a stored summary.
pub fn stored_summary_path(guild_id: &str, summary_id: &str) -> ApiPath {
    stored_summaries_path(guild_id).push(summary_id)
}

/// Path that pushes a stored summary to channels.
pub fn stored_summary_push_path(guild_id: &str, summary_id: &str) -> ApiPath {
    stored_summary_path(guild_id, summary_id).push("push")
}

/// Path to the default prompt set.
pub fn prompt_defaults_path() -> ApiPath {
    ApiPath::new().push("prompts").push("defaults")
}

/// Path to the default prompt of one category.
pub fn prompt_default_path(category: &str) -> ApiPath {
    prompt_defaults_path().push(category)
}
