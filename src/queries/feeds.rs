// Feed bindings.
// Cache keys, queries and mutations for a guild's RSS/Atom feeds.

use crate::api::{ApiClient, CreateFeedRequest, Feed, UpdateFeedRequest};
use crate::cache::{CacheKey, KeyPart, MutationDescriptor, QueryDescriptor};

use super::{ItemUpdate, present};

/// Prefix of a guild's feed list and feed details.
pub fn feeds_key(guild_id: impl Into<KeyPart>) -> CacheKey {
    CacheKey::new().with("feeds").with(guild_id)
}

pub fn feed_key(guild_id: impl Into<KeyPart>, feed_id: impl Into<KeyPart>) -> CacheKey {
    feeds_key(guild_id).with(feed_id)
}

pub fn feeds(api: &ApiClient, guild_id: Option<&str>) -> QueryDescriptor<Vec<Feed>> {
    let guild_id = present(guild_id);
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    QueryDescriptor::new(feeds_key(guild_id), move || {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.list_feeds(&guild).await }
    })
    .enabled(guild_id.is_some())
}

pub fn feed(api: &ApiClient, guild_id: Option<&str>, feed_id: Option<&str>) -> QueryDescriptor<Feed> {
    let (guild_id, feed_id) = (present(guild_id), present(feed_id));
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    let id = feed_id.unwrap_or_default().to_string();
    QueryDescriptor::new(feed_key(guild_id, feed_id), move || {
        let api = api.clone();
        let (guild, id) = (guild.clone(), id.clone());
        async move { api.get_feed(&guild, &id).await }
    })
    .enabled(guild_id.is_some() && feed_id.is_some())
}

pub fn create_feed(api: &ApiClient, guild_id: &str) -> MutationDescriptor<CreateFeedRequest, Feed> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |request: CreateFeedRequest| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.create_feed(&guild, &request).await }
    })
    .invalidates(feeds_key(guild_id))
}

pub fn update_feed(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<ItemUpdate<UpdateFeedRequest>, Feed> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |update: ItemUpdate<UpdateFeedRequest>| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.update_feed(&guild, &update.id, &update.body).await }
    })
    .invalidates(feeds_key(guild_id))
}

/// Input is the feed id.
pub fn delete_feed(api: &ApiClient, guild_id: &str) -> MutationDescriptor<String, ()> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |feed_id: String| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.delete_feed(&guild, &feed_id).await }
    })
    .invalidates(feeds_key(guild_id))
}

/// Input is the feed id. The returned feed carries the new URL.
pub fn regenerate_token(api: &ApiClient, guild_id: &str) -> MutationDescriptor<String, Feed> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |feed_id: String| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.regenerate_feed_token(&guild, &feed_id).await }
    })
    .invalidates(feeds_key(guild_id))
}
