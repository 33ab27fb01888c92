// Query observers.
// A live, read-only handle on one cache entry; dropping it detaches from the entry.

use std::marker::PhantomData;
use std::sync::Weak;

use tokio::sync::watch;
use tokio::time::Instant;

use super::coordinator::Shared;
use super::entry::{QueryState, QueryStatus, Snapshot};
use super::key::CacheKey;

pub struct QueryObserver<T> {
    key: CacheKey,
    rx: watch::Receiver<Snapshot>,
    /// Holds the channel open for idle observers so `changed` never resolves.
    _idle: Option<watch::Sender<Snapshot>>,
    coordinator: Weak<Shared>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryObserver<T> {
    pub(crate) fn attached(
        key: CacheKey,
        rx: watch::Receiver<Snapshot>,
        coordinator: Weak<Shared>,
    ) -> Self {
        Self {
            key,
            rx,
            _idle: None,
            coordinator,
            _marker: PhantomData,
        }
    }

    /// Observer for a disabled query or a stopped coordinator. Stays idle forever.
    pub(crate) fn idle(key: CacheKey) -> Self {
        let (tx, rx) = watch::channel(Snapshot::default());
        Self {
            key,
            rx,
            _idle: Some(tx),
            coordinator: Weak::new(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether this observer is attached to a coordinator entry.
    pub fn is_attached(&self) -> bool {
        self._idle.is_none()
    }
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    /// Current view of the entry.
    pub fn state(&self) -> QueryState<T> {
        let snapshot = self.rx.borrow();
        QueryState::from_snapshot(&self.key, &snapshot, Instant::now())
    }

    /// Wait for the next update. Returns false once the entry is gone
    /// (coordinator shut down).
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the entry is no longer loading and return that state.
    pub async fn settled(&mut self) -> QueryState<T> {
        // An Err here means the entry was dropped; the last value is still readable.
        let _ = self
            .rx
            .wait_for(|snapshot| snapshot.status != QueryStatus::Loading)
            .await;
        self.state()
    }

    /// Ask the coordinator to fetch again. Attaches to an in-flight fetch if
    /// there is one. Returns false for idle observers.
    pub fn refetch(&self) -> bool {
        match self.coordinator.upgrade() {
            Some(shared) => shared.refetch(&self.key),
            None => false,
        }
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.coordinator.upgrade() {
            shared.release(&self.key);
        }
    }
}
