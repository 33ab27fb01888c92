// Health binding.
// Server health query with a short freshness window and one retry.

use std::time::Duration;

use crate::api::{ApiClient, Health};
use crate::cache::{CacheKey, QueryDescriptor};

pub const HEALTH_STALE_TIME: Duration = Duration::from_secs(30);

pub fn health_key() -> CacheKey {
    CacheKey::new().with("health")
}

/// Server health. One automatic retry, then the error is surfaced.
pub fn health(api: &ApiClient) -> QueryDescriptor<Health> {
    let api = api.clone();
    QueryDescriptor::new(health_key(), move || {
        let api = api.clone();
        async move { api.health().await }
    })
    .stale_time(HEALTH_STALE_TIME)
    .retry(1)
}
