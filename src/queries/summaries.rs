// Stored summary bindings.
// Cache keys, queries and mutations for stored summaries, keyed by list filters.

use crate::api::{
    ApiClient, PushSummaryRequest, PushSummaryResult, StoredSummary, StoredSummaryFilter,
    StoredSummaryPage, UpdateStoredSummaryRequest,
};
use crate::cache::{CacheKey, KeyPart, MutationDescriptor, QueryDescriptor};

use super::{ItemUpdate, present};

/// Prefix of every stored summary entry of a guild.
pub fn stored_summaries_key(guild_id: impl Into<KeyPart>) -> CacheKey {
    CacheKey::new().with("stored-summaries").with(guild_id)
}

/// List key. Every filter takes part so each filter combination is cached separately.
pub fn list_key(guild_id: impl Into<KeyPart>, filter: &StoredSummaryFilter) -> CacheKey {
    let tags = (!filter.tags.is_empty()).then(|| filter.tags.join(","));
    let source = filter.source.filter_value();
    stored_summaries_key(guild_id)
        .with("list")
        .with(filter.page)
        .with(filter.limit)
        .with(filter.pinned)
        .with(filter.archived)
        .with(tags)
        .with(source)
}

pub fn detail_key(guild_id: impl Into<KeyPart>, summary_id: impl Into<KeyPart>) -> CacheKey {
    stored_summaries_key(guild_id).with("detail").with(summary_id)
}

pub fn stored_summaries(
    api: &ApiClient,
    guild_id: Option<&str>,
    filter: StoredSummaryFilter,
) -> QueryDescriptor<StoredSummaryPage> {
    let guild_id = present(guild_id);
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    let key = list_key(guild_id, &filter);
    QueryDescriptor::new(key, move || {
        let api = api.clone();
        let guild = guild.clone();
        let filter = filter.clone();
        async move { api.list_stored_summaries(&guild, &filter).await }
    })
    .enabled(guild_id.is_some())
}

pub fn stored_summary(
    api: &ApiClient,
    guild_id: Option<&str>,
    summary_id: Option<&str>,
) -> QueryDescriptor<StoredSummary> {
    let (guild_id, summary_id) = (present(guild_id), present(summary_id));
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    let id = summary_id.unwrap_or_default().to_string();
    QueryDescriptor::new(detail_key(guild_id, summary_id), move || {
        let api = api.clone();
        let (guild, id) = (guild.clone(), id.clone());
        async move { api.get_stored_summary(&guild, &id).await }
    })
    .enabled(guild_id.is_some() && summary_id.is_some())
}

pub fn update_stored_summary(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<ItemUpdate<UpdateStoredSummaryRequest>, StoredSummary> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |update: ItemUpdate<UpdateStoredSummaryRequest>| {
        let api = api.clone();
        let guild = guild.clone();
        async move {
            api.update_stored_summary(&guild, &update.id, &update.body)
                .await
        }
    })
    .invalidates(stored_summaries_key(guild_id))
}

/// Input is the summary id.
pub fn delete_stored_summary(api: &ApiClient, guild_id: &str) -> MutationDescriptor<String, ()> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |summary_id: String| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.delete_stored_summary(&guild, &summary_id).await }
    })
    .invalidates(stored_summaries_key(guild_id))
}

/// Pushing records delivery metadata on the summary, so the family is refreshed.
pub fn push_stored_summary(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<ItemUpdate<PushSummaryRequest>, PushSummaryResult> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |push: ItemUpdate<PushSummaryRequest>| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.push_stored_summary(&guild, &push.id, &push.body).await }
    })
    .invalidates(stored_summaries_key(guild_id))
}
