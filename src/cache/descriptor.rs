// Query and mutation descriptors.
// Bind a cache key to a fetch function, or a write function to the keys it invalidates.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Result;

use super::entry::AnyValue;
use super::key::CacheKey;

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;
type MutateFn<I, T> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Fetch function with its output type erased, as stored in an entry.
pub(crate) type ErasedFetch = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue>> + Send + Sync>;

/// Describes how to load the value addressed by a cache key.
pub struct QueryDescriptor<T> {
    key: CacheKey,
    fetch: FetchFn<T>,
    enabled: bool,
    stale_time: Option<Duration>,
    retry: u32,
}

impl<T> Clone for QueryDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetch: self.fetch.clone(),
            enabled: self.enabled,
            stale_time: self.stale_time,
            retry: self.retry,
        }
    }
}

impl<T> fmt::Debug for QueryDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .field("stale_time", &self.stale_time)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryDescriptor<T> {
    /// Create an enabled query with no retries and the coordinator's default freshness.
    pub fn new<F, Fut>(key: CacheKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            key,
            fetch: Arc::new(move || fetch().boxed()),
            enabled: true,
            stale_time: None,
            retry: 0,
        }
    }

    /// Skip fetching entirely while `enabled` is false.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// How long a successful result stays fresh.
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Number of automatic retries after a failed fetch.
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stale_time_or(&self, default: Duration) -> Duration {
        self.stale_time.unwrap_or(default)
    }

    pub fn retries(&self) -> u32 {
        self.retry
    }

    /// Run the fetch function once, bypassing the cache.
    pub async fn fetch(&self) -> Result<T> {
        (self.fetch)().await
    }

    pub(crate) fn erased(&self) -> ErasedFetch {
        let fetch = self.fetch.clone();
        Arc::new(move || {
            let fut = fetch();
            async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        })
    }
}

/// Describes a write against the API and the cache prefixes it makes stale.
pub struct MutationDescriptor<I, T> {
    mutate: MutateFn<I, T>,
    invalidates: Vec<CacheKey>,
}

impl<I, T> Clone for MutationDescriptor<I, T> {
    fn clone(&self) -> Self {
        Self {
            mutate: self.mutate.clone(),
            invalidates: self.invalidates.clone(),
        }
    }
}

impl<I, T> fmt::Debug for MutationDescriptor<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

impl<I: Send + 'static, T: Send + 'static> MutationDescriptor<I, T> {
    pub fn new<F, Fut>(mutate: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            mutate: Arc::new(move |input| mutate(input).boxed()),
            invalidates: Vec::new(),
        }
    }

    /// Add a prefix to mark stale after the write succeeds.
    pub fn invalidates(mut self, prefix: CacheKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    pub fn invalidation_prefixes(&self) -> &[CacheKey] {
        &self.invalidates
    }

    pub(crate) async fn run(&self, input: I) -> Result<T> {
        (self.mutate)(input).await
    }
}
