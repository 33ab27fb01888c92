// Guild bindings.
// Cache keys, queries and mutations for guilds, their config and channels.

use crate::api::{ApiClient, ChannelSyncResult, Guild, GuildConfig, UpdateGuildConfig};
use crate::cache::{CacheKey, KeyPart, MutationDescriptor, QueryDescriptor};

use super::present;

/// Prefix of every guild entry, list and details.
pub fn guilds_key() -> CacheKey {
    CacheKey::new().with("guilds")
}

pub fn guild_key(guild_id: impl Into<KeyPart>) -> CacheKey {
    guilds_key().with(guild_id)
}

pub fn guilds(api: &ApiClient) -> QueryDescriptor<Vec<Guild>> {
    let api = api.clone();
    QueryDescriptor::new(guilds_key(), move || {
        let api = api.clone();
        async move { api.list_guilds().await }
    })
}

/// Guild details. Disabled until a guild is selected.
pub fn guild(api: &ApiClient, guild_id: Option<&str>) -> QueryDescriptor<Guild> {
    let guild_id = present(guild_id);
    let api = api.clone();
    let id = guild_id.unwrap_or_default().to_string();
    QueryDescriptor::new(guild_key(guild_id), move || {
        let api = api.clone();
        let id = id.clone();
        async move { api.get_guild(&id).await }
    })
    .enabled(guild_id.is_some())
}

/// Config changes show up in the guild list and details.
pub fn update_config(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<UpdateGuildConfig, GuildConfig> {
    let api = api.clone();
    let id = guild_id.to_string();
    MutationDescriptor::new(move |update: UpdateGuildConfig| {
        let api = api.clone();
        let id = id.clone();
        async move { api.update_guild_config(&id, &update).await }
    })
    .invalidates(guilds_key())
}

pub fn sync_channels(api: &ApiClient, guild_id: &str) -> MutationDescriptor<(), ChannelSyncResult> {
    let api = api.clone();
    let id = guild_id.to_string();
    MutationDescriptor::new(move |_: ()| {
        let api = api.clone();
        let id = id.clone();
        async move { api.sync_channels(&id).await }
    })
    .invalidates(guilds_key())
}
