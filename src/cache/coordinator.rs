// Query/mutation cache coordinator.
// Owns every cache entry: de-duplicates fetches, applies prefix invalidation after
// mutations, notifies observers and subscribers, and evicts unused entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::CacheSettings;
use crate::error::{Result, SyncError};

use super::descriptor::{ErasedFetch, MutationDescriptor, QueryDescriptor};
use super::entry::{AnyValue, QueryStatus, Snapshot};
use super::key::CacheKey;
use super::lock::mutex_lock;
use super::observer::QueryObserver;

/// Upper bound for the exponential retry backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Status change of one entry, delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: CacheKey,
    pub status: QueryStatus,
}

type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct ListenerSlot {
    id: u64,
    prefix: CacheKey,
    callback: Listener,
}

struct InFlight {
    generation: u64,
    task: AbortHandle,
}

struct Entry {
    tx: watch::Sender<Snapshot>,
    /// Fetcher of the most recent observation; used for invalidation refetches.
    fetch: Option<ErasedFetch>,
    stale_time: Duration,
    retry: u32,
    observers: usize,
    in_flight: Option<InFlight>,
    /// Invalidated while a fetch was running.
    refetch_pending: bool,
    last_released: Instant,
}

impl Entry {
    fn new(now: Instant) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            tx,
            fetch: None,
            stale_time: Duration::ZERO,
            retry: 0,
            observers: 0,
            in_flight: None,
            refetch_pending: false,
            last_released: now,
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    listeners: Vec<ListenerSlot>,
    next_listener_id: u64,
    next_generation: u64,
    shut_down: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    settings: CacheSettings,
    runtime: Handle,
    gc_task: Mutex<Option<JoinHandle<()>>>,
}

/// Cache coordinator. Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Create a coordinator on the current Tokio runtime and start the
    /// garbage-collection sweep.
    pub fn start(settings: CacheSettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        if settings.gc_interval_secs == 0 {
            return Err(SyncError::Config(
                "cache.gc_interval_secs must be greater than zero".into(),
            ));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            settings,
            runtime,
            gc_task: Mutex::new(None),
        });

        let gc = spawn_gc(&shared);
        *mutex_lock(&shared.gc_task, "start") = Some(gc);

        debug!(
            stale_time_secs = shared.settings.stale_time_secs,
            gc_time_secs = shared.settings.gc_time_secs,
            "coordinator started"
        );
        Ok(Self { shared })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.shared.settings
    }

    /// Observe a query. Serves a fresh entry as is, attaches to an in-flight
    /// fetch, or starts one. Disabled queries get an idle observer and never fetch.
    pub fn observe<T: Send + Sync + 'static>(&self, query: &QueryDescriptor<T>) -> QueryObserver<T> {
        let key = query.key().clone();
        if !query.is_enabled() {
            trace!(key = %key, "query disabled, staying idle");
            return QueryObserver::idle(key);
        }

        let mut events = Vec::new();
        let rx = {
            let mut state = self.shared.lock("observe");
            if state.shut_down {
                warn!(key = %key, "observe after shutdown");
                return QueryObserver::idle(key);
            }

            let now = Instant::now();
            let stale_time = query.stale_time_or(self.shared.settings.stale_time());
            let entry = state
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.observers += 1;
            entry.fetch = Some(query.erased());
            entry.stale_time = stale_time;
            entry.retry = query.retries();

            let rx = entry.tx.subscribe();
            let fresh = entry.tx.borrow().is_fresh_at(now);
            let in_flight = entry.in_flight.is_some();

            if in_flight {
                debug!(key = %key, "attaching to in-flight fetch");
            } else if fresh {
                debug!(key = %key, "cache hit");
            } else {
                events.extend(self.shared.begin_fetch(&mut state, &key));
            }
            rx
        };

        self.shared.publish(events);
        QueryObserver::attached(key, rx, Arc::downgrade(&self.shared))
    }

    /// Observe a query and wait for it to settle, returning its value or error.
    pub async fn fetch_query<T: Send + Sync + 'static>(
        &self,
        query: &QueryDescriptor<T>,
    ) -> Result<Arc<T>> {
        if !query.is_enabled() {
            return Err(SyncError::Other(format!(
                "query {} is disabled",
                query.key()
            )));
        }

        let mut observer = self.observe(query);
        let state = observer.settled().await;
        match (state.status, state.data, state.error) {
            (QueryStatus::Error, _, Some(err)) => Err(SyncError::Shared(err)),
            (_, Some(data), _) => Ok(data),
            (_, None, Some(err)) => Err(SyncError::Shared(err)),
            (status, None, None) => Err(SyncError::Other(format!(
                "query {} settled as {} without data",
                query.key(),
                status
            ))),
        }
    }

    /// Run a mutation. On success every declared prefix is invalidated before
    /// returning; on failure the cache is left untouched.
    pub async fn mutate<I, T>(&self, mutation: &MutationDescriptor<I, T>, input: I) -> Result<T>
    where
        I: Send + 'static,
        T: Send + 'static,
    {
        match mutation.run(input).await {
            Ok(output) => {
                for prefix in mutation.invalidation_prefixes() {
                    self.invalidate(prefix);
                }
                Ok(output)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    prefixes = mutation.invalidation_prefixes().len(),
                    "mutation failed, cache left untouched"
                );
                Err(err)
            }
        }
    }

    /// Mark every entry under `prefix` stale and refetch the observed ones.
    /// Returns the number of matching entries.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        self.shared.invalidate(prefix)
    }

    /// Force a fetch for `key` using its last known fetcher.
    pub fn refetch(&self, key: &CacheKey) -> bool {
        self.shared.refetch(key)
    }

    /// Last successfully fetched value for `key`, if any.
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let state = self.shared.lock("get_query_data");
        let data = state.entries.get(key)?.tx.borrow().data.clone()?;
        data.downcast::<T>().ok()
    }

    /// Current status of `key`, or None if there is no entry.
    pub fn status(&self, key: &CacheKey) -> Option<QueryStatus> {
        let state = self.shared.lock("status");
        let entry = state.entries.get(key)?;
        let status = entry.tx.borrow().status_at(Instant::now());
        Some(status)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.shared.lock("len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `callback` for every status change of an entry under `prefix`.
    pub fn subscribe<F>(&self, prefix: CacheKey, callback: F) -> Subscription
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let mut state = self.shared.lock("subscribe");
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push(ListenerSlot {
            id,
            prefix,
            callback: Arc::new(callback),
        });
        Subscription {
            id,
            coordinator: Arc::downgrade(&self.shared),
        }
    }

    /// Evict entries with no observers and no fetch that have been unused for
    /// at least `gc_time`. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        self.shared.collect_garbage()
    }

    /// Stop the coordinator: abort the sweep and in-flight fetches and drop
    /// every entry. Later observations return idle observers.
    pub fn shutdown(&self) {
        if let Some(gc) = mutex_lock(&self.shared.gc_task, "shutdown").take() {
            gc.abort();
        }

        let drained: Vec<(CacheKey, Entry)> = {
            let mut state = self.shared.lock("shutdown");
            state.shut_down = true;
            state.listeners.clear();
            state.entries.drain().collect()
        };

        let count = drained.len();
        for (key, entry) in drained {
            if let Some(in_flight) = entry.in_flight {
                in_flight.task.abort();
                let err = Arc::new(SyncError::Cancelled {
                    key: key.to_string(),
                });
                entry.tx.send_modify(|snapshot| {
                    snapshot.status = QueryStatus::Error;
                    snapshot.error = Some(err);
                });
                debug!(key = %key, "cancelled in-flight fetch");
            }
        }

        info!(entries = count, "coordinator shut down");
    }
}

impl Shared {
    fn lock(&self, op: &'static str) -> MutexGuard<'_, State> {
        mutex_lock(&self.state, op)
    }

    /// Mark `key` loading and spawn its fetch. Caller holds the state lock, so
    /// the check-and-start is atomic with respect to other observers.
    fn begin_fetch(self: &Arc<Self>, state: &mut State, key: &CacheKey) -> Option<CacheEvent> {
        let generation = state.next_generation;
        state.next_generation += 1;

        let entry = state.entries.get_mut(key)?;
        let fetch = entry.fetch.clone()?;
        entry.refetch_pending = false;
        entry
            .tx
            .send_modify(|snapshot| snapshot.status = QueryStatus::Loading);

        let retry = entry.retry;
        let base_delay = self.settings.retry_delay();
        let shared = Arc::clone(self);
        let task_key = key.clone();
        let task = self.runtime.spawn(async move {
            let result = fetch_with_retry(&task_key, fetch, retry, base_delay).await;
            shared.finish_fetch(&task_key, generation, result);
        });

        entry.in_flight = Some(InFlight {
            generation,
            task: task.abort_handle(),
        });
        debug!(key = %key, generation, "fetch started");

        Some(CacheEvent {
            key: key.clone(),
            status: QueryStatus::Loading,
        })
    }

    /// Store a fetch result. Runs even when nobody observes the entry anymore.
    fn finish_fetch(self: &Arc<Self>, key: &CacheKey, generation: u64, result: Result<AnyValue>) {
        let mut events = Vec::new();
        {
            let mut state = self.lock("finish_fetch");
            let Some(entry) = state.entries.get_mut(key) else {
                debug!(key = %key, "entry gone, discarding fetch result");
                return;
            };
            if entry.in_flight.as_ref().map(|f| f.generation) != Some(generation) {
                debug!(key = %key, generation, "superseded fetch result discarded");
                return;
            }
            entry.in_flight = None;

            let now = Instant::now();
            let pending = entry.refetch_pending;
            // Invalidated mid-fetch with someone watching: the result is already
            // outdated, so observers keep seeing Loading until the follow-up lands.
            let refetch = pending && entry.observers > 0;
            let fresh_until = now + entry.stale_time;
            let status = match result {
                Ok(value) => {
                    let status = if refetch {
                        QueryStatus::Loading
                    } else if pending {
                        QueryStatus::Stale
                    } else {
                        QueryStatus::Fresh
                    };
                    entry.tx.send_modify(|snapshot| {
                        snapshot.status = status;
                        snapshot.data = Some(value);
                        snapshot.error = None;
                        snapshot.updated_at = Some(now);
                        snapshot.fresh_until = (!pending).then_some(fresh_until);
                    });
                    debug!(key = %key, status = %status, "fetch succeeded");
                    status
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "fetch failed");
                    let err = Arc::new(err);
                    let status = if refetch {
                        QueryStatus::Loading
                    } else {
                        QueryStatus::Error
                    };
                    entry.tx.send_modify(|snapshot| {
                        snapshot.status = status;
                        snapshot.error = Some(err);
                        snapshot.fresh_until = None;
                    });
                    status
                }
            };

            if refetch {
                debug!(key = %key, "invalidated during fetch, refetching");
                match self.begin_fetch(&mut state, key) {
                    Some(event) => events.push(event),
                    None => events.push(self.mark_stale(&mut state, key)),
                }
            } else {
                events.push(CacheEvent {
                    key: key.clone(),
                    status,
                });
            }
        }
        self.publish(events);
    }

    fn invalidate(self: &Arc<Self>, prefix: &CacheKey) -> usize {
        let mut events = Vec::new();
        let matched = {
            let mut state = self.lock("invalidate");
            let keys: Vec<CacheKey> = state
                .entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();

            let mut observed = Vec::new();
            for key in &keys {
                let Some(entry) = state.entries.get_mut(key) else {
                    continue;
                };
                if entry.in_flight.is_some() {
                    entry.refetch_pending = true;
                    continue;
                }
                if entry.observers > 0 {
                    observed.push(key.clone());
                } else {
                    events.push(self.mark_stale(&mut state, key));
                }
            }

            // Observed entries go straight to Loading so a waiting observer
            // never settles on the invalidated value.
            for key in &observed {
                events.push(CacheEvent {
                    key: key.clone(),
                    status: QueryStatus::Stale,
                });
                match self.begin_fetch(&mut state, key) {
                    Some(event) => events.push(event),
                    None => events.push(self.mark_stale(&mut state, key)),
                }
            }

            debug!(
                prefix = %prefix,
                matched = keys.len(),
                refetching = observed.len(),
                "invalidated cache prefix"
            );
            keys.len()
        };

        self.publish(events);
        matched
    }

    fn mark_stale(&self, state: &mut State, key: &CacheKey) -> CacheEvent {
        if let Some(entry) = state.entries.get_mut(key) {
            entry.tx.send_modify(|snapshot| {
                snapshot.status = QueryStatus::Stale;
                snapshot.fresh_until = None;
            });
        }
        CacheEvent {
            key: key.clone(),
            status: QueryStatus::Stale,
        }
    }

    pub(crate) fn refetch(self: &Arc<Self>, key: &CacheKey) -> bool {
        let event = {
            let mut state = self.lock("refetch");
            match state.entries.get(key) {
                Some(entry) if entry.in_flight.is_some() => return true,
                Some(entry) if entry.fetch.is_some() => {}
                _ => return false,
            }
            self.begin_fetch(&mut state, key)
        };
        let started = event.is_some();
        self.publish(event.into_iter().collect());
        started
    }

    /// Detach one observer from `key`.
    pub(crate) fn release(&self, key: &CacheKey) {
        let mut state = self.lock("release");
        if let Some(entry) = state.entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.last_released = Instant::now();
            }
        }
    }

    fn collect_garbage(&self) -> usize {
        let gc_time = self.settings.gc_time();
        let now = Instant::now();
        let mut state = self.lock("collect_garbage");
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            let keep = entry.observers > 0
                || entry.in_flight.is_some()
                || now.duration_since(entry.last_released) < gc_time;
            if !keep {
                trace!(key = %key, "evicting unused cache entry");
            }
            keep
        });
        before - state.entries.len()
    }

    /// Deliver events to matching subscribers outside the state lock.
    fn publish(&self, events: Vec<CacheEvent>) {
        if events.is_empty() {
            return;
        }

        let deliveries: Vec<(Listener, CacheEvent)> = {
            let state = self.lock("publish");
            events
                .into_iter()
                .flat_map(|event| {
                    state
                        .listeners
                        .iter()
                        .filter(|slot| event.key.starts_with(&slot.prefix))
                        .map(|slot| (slot.callback.clone(), event.clone()))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        for (callback, event) in deliveries {
            callback(&event);
        }
    }

    fn remove_listener(&self, id: u64) {
        self.lock("unsubscribe").listeners.retain(|slot| slot.id != id);
    }
}

/// Handle returned by [`Coordinator::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    coordinator: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.coordinator.upgrade() {
            shared.remove_listener(self.id);
        }
    }
}

async fn fetch_with_retry(
    key: &CacheKey,
    fetch: ErasedFetch,
    retry: u32,
    base_delay: Duration,
) -> Result<AnyValue> {
    let mut attempt = 0;
    loop {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retry => {
                let delay = backoff_delay(base_delay, attempt);
                attempt += 1;
                warn!(
                    key = %key,
                    attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

fn spawn_gc(shared: &Arc<Shared>) -> JoinHandle<()> {
    let weak = Arc::downgrade(shared);
    let period = shared.settings.gc_interval();
    shared.runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            let evicted = shared.collect_garbage();
            if evicted > 0 {
                debug!(evicted, "garbage collected cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache_key;

    fn settings() -> CacheSettings {
        CacheSettings {
            stale_time_secs: 60,
            gc_time_secs: 300,
            gc_interval_secs: 3600,
            retry_delay_ms: 1000,
        }
    }

    fn start() -> Coordinator {
        Coordinator::start(settings()).unwrap()
    }

    /// Query whose fetch takes `delay` and returns `"<key>#<call number>"`.
    fn counting_query(key: CacheKey, calls: Arc<AtomicUsize>, delay: Duration) -> QueryDescriptor<String> {
        let label = key.to_string();
        QueryDescriptor::new(key, move || {
            let calls = calls.clone();
            let label = label.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(format!("{}#{}", label, n))
            }
        })
    }

    /// Query that fails its first `failures` calls with HTTP 503.
    fn flaky_query(key: CacheKey, calls: Arc<AtomicUsize>, failures: usize) -> QueryDescriptor<String> {
        QueryDescriptor::new(key, move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(SyncError::Http {
                        status: 503,
                        message: "unavailable".into(),
                    })
                } else {
                    Ok("ok".to_string())
                }
            }
        })
    }

    #[tokio::test]
    async fn test_start_rejects_zero_gc_interval() {
        let mut settings = settings();
        settings.gc_interval_secs = 0;
        assert!(matches!(
            Coordinator::start(settings),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        assert!(matches!(
            Coordinator::start(settings()),
            Err(SyncError::NoRuntime)
        ));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, 10), MAX_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_observers_share_one_fetch() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(
            cache_key!["feeds", "guild1"],
            calls.clone(),
            Duration::from_secs(2),
        );

        let mut first = coordinator.observe(&query);
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut second = coordinator.observe(&query);
        assert!(second.state().is_loading());

        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(a.is_fresh() && b.is_fresh());
        assert!(Arc::ptr_eq(a.data.as_ref().unwrap(), b.data.as_ref().unwrap()));
        assert_eq!(a.data().unwrap(), r#"["feeds","guild1"]#1"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_served_without_fetch() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(cache_key!["guilds"], calls.clone(), Duration::from_millis(10));

        let mut observer = coordinator.observe(&query);
        observer.settled().await;
        drop(observer);

        tokio::time::advance(Duration::from_secs(30)).await;
        let observer = coordinator.observe(&query);

        assert!(observer.state().is_fresh());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches_and_keeps_old_value_while_loading() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(cache_key!["guilds"], calls.clone(), Duration::from_millis(10));

        let mut observer = coordinator.observe(&query);
        observer.settled().await;
        drop(observer);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(coordinator.status(&cache_key!["guilds"]), Some(QueryStatus::Stale));

        let mut observer = coordinator.observe(&query);
        let loading = observer.state();
        assert!(loading.is_loading());
        assert_eq!(loading.data().unwrap(), r#"["guilds"]#1"#);

        let settled = observer.settled().await;
        assert_eq!(settled.data().unwrap(), r#"["guilds"]#2"#);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_query_never_fetches() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(cache_key!["feeds", None::<&str>], calls.clone(), Duration::ZERO)
            .enabled(false);

        let mut observer = coordinator.observe(&query);
        assert!(!observer.is_attached());
        assert!(observer.state().is_idle());
        assert!(observer.settled().await.is_idle());
        assert!(!observer.refetch());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(coordinator.is_empty());
        assert!(coordinator.fetch_query(&query).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_mutation_invalidates_prefix() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let list = counting_query(cache_key!["feeds", "guild1"], calls.clone(), Duration::from_millis(10));
        let detail = counting_query(
            cache_key!["feeds", "guild1", "feed9"],
            calls.clone(),
            Duration::from_millis(10),
        );
        let other = counting_query(cache_key!["feeds", "guild2"], calls.clone(), Duration::from_millis(10));

        let mut list_observer = coordinator.observe(&list);
        list_observer.settled().await;
        coordinator.observe(&detail).settled().await;
        coordinator.observe(&other).settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let create = MutationDescriptor::new(|title: String| async move { Ok(title) })
            .invalidates(cache_key!["feeds", "guild1"]);
        let created = coordinator.mutate(&create, "new feed".to_string()).await.unwrap();
        assert_eq!(created, "new feed");

        // Observed entry is refetching, unobserved one is stale, sibling untouched.
        assert_eq!(
            coordinator.status(&cache_key!["feeds", "guild1"]),
            Some(QueryStatus::Loading)
        );
        assert_eq!(
            coordinator.status(&cache_key!["feeds", "guild1", "feed9"]),
            Some(QueryStatus::Stale)
        );
        assert_eq!(
            coordinator.status(&cache_key!["feeds", "guild2"]),
            Some(QueryStatus::Fresh)
        );

        let refreshed = list_observer.settled().await;
        assert!(refreshed.is_fresh());
        assert_eq!(refreshed.data().unwrap(), r#"["feeds","guild1"]#4"#);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mutation_leaves_cache_unchanged() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let list = counting_query(cache_key!["feeds", "guild1"], calls.clone(), Duration::from_millis(10));
        let _observer = {
            let mut observer = coordinator.observe(&list);
            observer.settled().await;
            observer
        };

        let create = MutationDescriptor::new(|_: String| async move {
            Err::<String, _>(SyncError::Http {
                status: 422,
                message: "invalid channel".into(),
            })
        })
        .invalidates(cache_key!["feeds", "guild1"]);

        let err = coordinator.mutate(&create, "x".into()).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            coordinator.status(&cache_key!["feeds", "guild1"]),
            Some(QueryStatus::Fresh)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_are_not_deduplicated() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache_key!["schedules", "g1"];
        let list = counting_query(key.clone(), calls.clone(), Duration::from_millis(10));
        let mut observer = coordinator.observe(&list);
        observer.settled().await;

        let writes = Arc::new(AtomicUsize::new(0));
        let counter = writes.clone();
        let run = MutationDescriptor::new(move |_: u32| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(counter.fetch_add(1, Ordering::SeqCst))
            }
        })
        .invalidates(key.clone());

        let (a, b) = tokio::join!(coordinator.mutate(&run, 1), coordinator.mutate(&run, 1));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(writes.load(Ordering::SeqCst), 2);

        // The first invalidation starts a refetch; the second lands while it
        // runs and forces one more.
        let state = observer.settled().await;
        assert!(state.is_fresh());
        assert_eq!(state.data().unwrap(), r#"["schedules","g1"]#3"#);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.status(&key), Some(QueryStatus::Fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_once_then_surface_error() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let health = flaky_query(cache_key!["health"], calls.clone(), usize::MAX).retry(1);

        let state = coordinator.observe(&health).settled().await;

        assert!(state.is_error());
        assert_eq!(state.error.as_ref().unwrap().status(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let health = flaky_query(cache_key!["health"], calls.clone(), 1).retry(1);

        let value = coordinator.fetch_query(&health).await.unwrap();

        assert_eq!(value.as_str(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_by_default() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = flaky_query(cache_key!["guilds"], calls.clone(), 1);

        let err = coordinator.fetch_query(&query).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Manual re-observation fetches again.
        let value = coordinator.fetch_query(&query).await.unwrap();
        assert_eq!(value.as_str(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_fetch_still_populates_cache() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache_key!["schedules", "g1"];
        let query = counting_query(key.clone(), calls.clone(), Duration::from_secs(2));

        drop(coordinator.observe(&query));
        assert_eq!(coordinator.status(&key), Some(QueryStatus::Loading));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(coordinator.status(&key), Some(QueryStatus::Fresh));
        let data: Arc<String> = coordinator.get_query_data(&key).unwrap();
        assert_eq!(data.as_str(), r#"["schedules","g1"]#1"#);
        assert!(coordinator.get_query_data::<u32>(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_refetches_observed_entry() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache_key!["stored-summaries", "g1"];
        let query = counting_query(key.clone(), calls.clone(), Duration::from_secs(1));

        let mut observer = coordinator.observe(&query);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(coordinator.invalidate(&cache_key!["stored-summaries"]), 1);

        let state = observer.settled().await;
        assert!(state.is_fresh());
        assert_eq!(state.data().unwrap(), r#"["stored-summaries","g1"]#2"#);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_settled_never_returns_invalidated_value_across_threads() {
        for round in 0..50 {
            let coordinator = start();
            let calls = Arc::new(AtomicUsize::new(0));
            let key = cache_key!["feeds", "g1"];
            let query = counting_query(key.clone(), calls.clone(), Duration::from_millis(5));

            let mut observer = coordinator.observe(&query);
            tokio::time::sleep(Duration::from_millis(1)).await;
            coordinator.invalidate(&key);

            let state = observer.settled().await;
            assert_eq!(
                state.status,
                QueryStatus::Fresh,
                "round {round}: settled on {} after {} calls",
                state.status,
                calls.load(Ordering::SeqCst)
            );
            assert_eq!(state.data().unwrap(), r#"["feeds","g1"]#2"#, "round {round}");
            coordinator.shutdown();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fetch_query_after_mutation_sees_new_value() {
        for round in 0..50 {
            let coordinator = start();
            let calls = Arc::new(AtomicUsize::new(0));
            let key = cache_key!["guilds"];
            let query = counting_query(key.clone(), calls.clone(), Duration::from_millis(2));
            let _observer = coordinator.observe(&query);
            coordinator.fetch_query(&query).await.unwrap();

            let update = MutationDescriptor::new(|_: ()| async { Ok(()) }).invalidates(key.clone());
            coordinator.mutate(&update, ()).await.unwrap();

            let value = coordinator.fetch_query(&query).await.unwrap();
            assert_eq!(value.as_str(), r#"["guilds"]#2"#, "round {round}");
            coordinator.shutdown();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_marks_unobserved_entry_stale() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache_key!["stored-summaries", "g1"];
        let query = counting_query(key.clone(), calls.clone(), Duration::from_secs(1));

        drop(coordinator.observe(&query));
        coordinator.invalidate(&key);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(coordinator.status(&key), Some(QueryStatus::Stale));
        assert!(coordinator.get_query_data::<String>(&key).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_uses_known_fetcher() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache_key!["prompts", "defaults"];
        let query = counting_query(key.clone(), calls.clone(), Duration::from_millis(10));

        let mut observer = coordinator.observe(&query);
        observer.settled().await;
        assert!(observer.refetch());
        assert!(observer.settled().await.is_fresh());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(!coordinator.refetch(&cache_key!["unknown"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_collection_spares_observed_entries() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let kept = counting_query(cache_key!["guilds"], calls.clone(), Duration::from_millis(10));
        let dropped = counting_query(cache_key!["guilds", "g1"], calls.clone(), Duration::from_millis(10));

        let mut observer = coordinator.observe(&kept);
        observer.settled().await;
        coordinator.observe(&dropped).settled().await;

        assert_eq!(coordinator.collect_garbage(), 0);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(coordinator.collect_garbage(), 1);

        assert_eq!(coordinator.len(), 1);
        assert!(coordinator.status(&cache_key!["guilds"]).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_unused_entries() {
        let mut settings = settings();
        settings.gc_interval_secs = 60;
        let coordinator = Coordinator::start(settings).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(cache_key!["guilds"], calls, Duration::from_millis(10));

        coordinator.observe(&query).settled().await;
        assert_eq!(coordinator.len(), 1);

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(coordinator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_receives_prefix_events_until_dropped() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let subscription = coordinator.subscribe(cache_key!["feeds"], move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        let unrelated = coordinator.subscribe(cache_key!["schedules"], |_| {
            panic!("unrelated subscriber notified");
        });

        let key = cache_key!["feeds", "g1"];
        let query = counting_query(key.clone(), calls, Duration::from_millis(10));
        coordinator.observe(&query).settled().await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                CacheEvent {
                    key: key.clone(),
                    status: QueryStatus::Loading
                },
                CacheEvent {
                    key: key.clone(),
                    status: QueryStatus::Fresh
                },
            ]
        );

        subscription.unsubscribe();
        coordinator.invalidate(&key);
        assert_eq!(events.lock().unwrap().len(), 2);
        drop(unrelated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_stops_observing() {
        let coordinator = start();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(cache_key!["health"], calls.clone(), Duration::from_secs(10));

        let mut observer = coordinator.observe(&query);
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.shutdown();

        let state = observer.settled().await;
        assert!(state.is_error());
        assert!(matches!(
            state.error.as_deref(),
            Some(SyncError::Cancelled { .. })
        ));
        assert!(coordinator.is_empty());

        let after = coordinator.observe(&query);
        assert!(after.state().is_idle());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
