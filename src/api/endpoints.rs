// Dashboard API endpoint functions.
// Typed methods for every REST resource the dashboard reads or writes.

use crate::error::Result;

use super::client::ApiClient;
use super::paths;
use super::types::{
    ChannelSyncResult, CreateFeedRequest, CreateScheduleRequest, DefaultPrompt, ExecutionRecord,
    Feed, Guild, GuildConfig, Health, PushSummaryRequest, PushSummaryResult, Schedule,
    ScheduleRunResult, StoredSummary, StoredSummaryFilter, StoredSummaryPage, UpdateFeedRequest,
    UpdateGuildConfig, UpdateScheduleRequest, UpdateStoredSummaryRequest,
};

impl ApiClient {
    /// Get the guilds visible to the dashboard.
    pub async fn list_guilds(&self) -> Result<Vec<Guild>> {
        self.get(&paths::guilds_path()).await
    }

    pub async fn get_guild(&self, guild_id: &str) -> Result<Guild> {
        self.get(&paths::guild_path(guild_id)).await
    }

    pub async fn update_guild_config(
        &self,
        guild_id: &str,
        update: &UpdateGuildConfig,
    ) -> Result<GuildConfig> {
        self.patch(&paths::guild_config_path(guild_id), update).await
    }

    /// Re-read the guild's channel list from Discord.
    pub async fn sync_channels(&self, guild_id: &str) -> Result<ChannelSyncResult> {
        self.post::<_, ()>(&paths::channels_sync_path(guild_id), None)
            .await
    }

    pub async fn list_feeds(&self, guild_id: &str) -> Result<Vec<Feed>> {
        self.get(&paths::feeds_path(guild_id)).await
    }

    pub async fn get_feed(&self, guild_id: &str, feed_id: &str) -> Result<Feed> {
        self.get(&paths::feed_path(guild_id, feed_id)).await
    }

    pub async fn create_feed(&self, guild_id: &str, request: &CreateFeedRequest) -> Result<Feed> {
        self.post(&paths::feeds_path(guild_id), Some(request)).await
    }

    pub async fn update_feed(
        &self,
        guild_id: &str,
        feed_id: &str,
        update: &UpdateFeedRequest,
    ) -> Result<Feed> {
        self.patch(&paths::feed_path(guild_id, feed_id), update).await
    }

    pub async fn delete_feed(&self, guild_id: &str, feed_id: &str) -> Result<()> {
        self.delete(&paths::feed_path(guild_id, feed_id)).await
    }

    /// Rotate a private feed's access token. Old feed URLs stop working.
    pub async fn regenerate_feed_token(&self, guild_id: &str, feed_id: &str) -> Result<Feed> {
        self.post::<_, ()>(&paths::feed_token_path(guild_id, feed_id), None)
            .await
    }

    pub async fn list_schedules(&self, guild_id: &str) -> Result<Vec<Schedule>> {
        self.get(&paths::schedules_path(guild_id)).await
    }

    pub async fn create_schedule(
        &self,
        guild_id: &str,
        request: &CreateScheduleRequest,
    ) -> Result<Schedule> {
        self.post(&paths::schedules_path(guild_id), Some(request))
            .await
    }

    pub async fn update_schedule(
        &self,
        guild_id: &str,
        schedule_id: &str,
        update: &UpdateScheduleRequest,
    ) -> Result<Schedule> {
        self.patch(&paths::schedule_path(guild_id, schedule_id), update)
            .await
    }

    pub async fn delete_schedule(&self, guild_id: &str, schedule_id: &str) -> Result<()> {
        self.delete(&paths::schedule_path(guild_id, schedule_id))
            .await
    }

    /// Execute a schedule now, outside its normal cadence.
    pub async fn run_schedule(&self, guild_id: &str, schedule_id: &str) -> Result<ScheduleRunResult> {
        self.post::<_, ()>(&paths::schedule_run_path(guild_id, schedule_id), None)
            .await
    }

    pub async fn get_schedule_history(
        &self,
        guild_id: &str,
        schedule_id: &str,
    ) -> Result<Vec<ExecutionRecord>> {
        self.get(&paths::schedule_history_path(guild_id, schedule_id))
            .await
    }

    pub async fn list_stored_summaries(
        &self,
        guild_id: &str,
        filter: &StoredSummaryFilter,
    ) -> Result<StoredSummaryPage> {
        self.get_with_params(
            &paths::stored_summaries_path(guild_id),
            &filter.query_params(),
        )
        .await
    }

    pub async fn get_stored_summary(&self, guild_id: &str, summary_id: &str) -> Result<StoredSummary> {
        self.get(&paths::stored_summary_path(guild_id, summary_id))
            .await
    }

    pub async fn update_stored_summary(
        &self,
        guild_id: &str,
        summary_id: &str,
        update: &UpdateStoredSummaryRequest,
    ) -> Result<StoredSummary> {
        self.patch(&paths::stored_summary_path(guild_id, summary_id), update)
            .await
    }

    pub async fn delete_stored_summary(&self, guild_id: &str, summary_id: &str) -> Result<()> {
        self.delete(&paths::stored_summary_path(guild_id, summary_id))
            .await
    }

    /// Post a stored summary into one or more channels.
    pub async fn push_stored_summary(
        &self,
        guild_id: &str,
        summary_id: &str,
        request: &PushSummaryRequest,
    ) -> Result<PushSummaryResult> {
        self.post(
            &paths::stored_summary_push_path(guild_id, summary_id),
            Some(request),
        )
        .await
    }

    pub async fn list_default_prompts(&self) -> Result<Vec<DefaultPrompt>> {
        self.get(&paths::prompt_defaults_path()).await
    }

    pub async fn get_default_prompt(&self, category: &str) -> Result<DefaultPrompt> {
        self.get(&paths::prompt_default_path(category)).await
    }

    /// Server health, from the unversioned root.
    pub async fn health(&self) -> Result<Health> {
        self.get_root(&paths::health_path()).await
    }
}
