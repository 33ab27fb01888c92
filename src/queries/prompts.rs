// Prompt bindings.
// Read-only queries for the built-in prompt templates.

use std::time::Duration;

use crate::api::{ApiClient, DefaultPrompt};
use crate::cache::{CacheKey, KeyPart, QueryDescriptor};

use super::present;

/// Built-in prompts change only with a server release.
pub const PROMPT_STALE_TIME: Duration = Duration::from_secs(10 * 60);

pub fn default_prompts_key() -> CacheKey {
    CacheKey::new().with("prompts").with("defaults")
}

pub fn default_prompt_key(category: impl Into<KeyPart>) -> CacheKey {
    default_prompts_key().with(category)
}

pub fn default_prompts(api: &ApiClient) -> QueryDescriptor<Vec<DefaultPrompt>> {
    let api = api.clone();
    QueryDescriptor::new(default_prompts_key(), move || {
        let api = api.clone();
        async move { api.list_default_prompts().await }
    })
    .stale_time(PROMPT_STALE_TIME)
}

pub fn default_prompt(api: &ApiClient, category: Option<&str>) -> QueryDescriptor<DefaultPrompt> {
    let category = present(category);
    let api = api.clone();
    let name = category.unwrap_or_default().to_string();
    QueryDescriptor::new(default_prompt_key(category), move || {
        let api = api.clone();
        let name = name.clone();
        async move { api.get_default_prompt(&name).await }
    })
    .stale_time(PROMPT_STALE_TIME)
    .enabled(category.is_some())
}
