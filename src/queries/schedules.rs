// Schedule bindings.
// Cache keys, queries and mutations for summary schedules and their run history.

use crate::api::{
    ApiClient, CreateScheduleRequest, ExecutionRecord, Schedule, ScheduleRunResult,
    UpdateScheduleRequest,
};
use crate::cache::{CacheKey, KeyPart, MutationDescriptor, QueryDescriptor};

use super::summaries::stored_summaries_key;
use super::{ItemUpdate, present};

/// Prefix of a guild's schedule list and every schedule's history.
pub fn schedules_key(guild_id: impl Into<KeyPart>) -> CacheKey {
    CacheKey::new().with("schedules").with(guild_id)
}

pub fn history_key(guild_id: impl Into<KeyPart>, schedule_id: impl Into<KeyPart>) -> CacheKey {
    schedules_key(guild_id).with(schedule_id).with("history")
}

pub fn schedules(api: &ApiClient, guild_id: Option<&str>) -> QueryDescriptor<Vec<Schedule>> {
    let guild_id = present(guild_id);
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    QueryDescriptor::new(schedules_key(guild_id), move || {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.list_schedules(&guild).await }
    })
    .enabled(guild_id.is_some())
}

/// Past executions of one schedule.
pub fn history(
    api: &ApiClient,
    guild_id: Option<&str>,
    schedule_id: Option<&str>,
) -> QueryDescriptor<Vec<ExecutionRecord>> {
    let (guild_id, schedule_id) = (present(guild_id), present(schedule_id));
    let api = api.clone();
    let guild = guild_id.unwrap_or_default().to_string();
    let id = schedule_id.unwrap_or_default().to_string();
    QueryDescriptor::new(history_key(guild_id, schedule_id), move || {
        let api = api.clone();
        let (guild, id) = (guild.clone(), id.clone());
        async move { api.get_schedule_history(&guild, &id).await }
    })
    .enabled(guild_id.is_some() && schedule_id.is_some())
}

pub fn create_schedule(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<CreateScheduleRequest, Schedule> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |request: CreateScheduleRequest| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.create_schedule(&guild, &request).await }
    })
    .invalidates(schedules_key(guild_id))
}

pub fn update_schedule(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<ItemUpdate<UpdateScheduleRequest>, Schedule> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |update: ItemUpdate<UpdateScheduleRequest>| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.update_schedule(&guild, &update.id, &update.body).await }
    })
    .invalidates(schedules_key(guild_id))
}

/// Input is the schedule id.
pub fn delete_schedule(api: &ApiClient, guild_id: &str) -> MutationDescriptor<String, ()> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |schedule_id: String| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.delete_schedule(&guild, &schedule_id).await }
    })
    .invalidates(schedules_key(guild_id))
}

/// Input is the schedule id. A run may produce a new stored summary.
pub fn run_schedule(
    api: &ApiClient,
    guild_id: &str,
) -> MutationDescriptor<String, ScheduleRunResult> {
    let api = api.clone();
    let guild = guild_id.to_string();
    MutationDescriptor::new(move |schedule_id: String| {
        let api = api.clone();
        let guild = guild.clone();
        async move { api.run_schedule(&guild, &schedule_id).await }
    })
    .invalidates(schedules_key(guild_id))
    .invalidates(stored_summaries_key(guild_id))
}
