// Cache entry state.
// Status tracking, freshness deadlines, and the typed read-only view handed to callers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::SyncError;

use super::key::CacheKey;

/// Type-erased cached value. Downcast to the query's `T` on read.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Fresh,
    Stale,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Fresh => "fresh",
            QueryStatus::Stale => "stale",
            QueryStatus::Error => "error",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state of one entry, published to observers through a watch channel.
#[derive(Clone, Default)]
pub(crate) struct Snapshot {
    pub status: QueryStatus,
    /// Last successfully fetched value. Kept while reloading and after errors.
    pub data: Option<AnyValue>,
    /// Cause of the last failed attempt.
    pub error: Option<Arc<SyncError>>,
    pub updated_at: Option<Instant>,
    pub fresh_until: Option<Instant>,
}

impl Snapshot {
    /// Status as seen at `now`: a fresh entry past its deadline reads as stale.
    pub fn status_at(&self, now: Instant) -> QueryStatus {
        match (self.status, self.fresh_until) {
            (QueryStatus::Fresh, Some(deadline)) if now >= deadline => QueryStatus::Stale,
            (status, _) => status,
        }
    }

    pub fn is_fresh_at(&self, now: Instant) -> bool {
        self.status_at(now) == QueryStatus::Fresh
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("updated_at", &self.updated_at)
            .field("fresh_until", &self.fresh_until)
            .finish()
    }
}

/// Read-only view of a cache entry for a query of type `T`.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<Arc<SyncError>>,
    /// When the value was last fetched successfully.
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
        }
    }
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_snapshot(key: &CacheKey, snapshot: &Snapshot, now: Instant) -> Self {
        let mut error = snapshot.error.clone();
        let data = match snapshot.data.clone().map(|value| value.downcast::<T>()) {
            Some(Ok(value)) => Some(value),
            Some(Err(_)) => {
                error = Some(Arc::new(SyncError::TypeMismatch {
                    key: key.to_string(),
                }));
                None
            }
            None => None,
        };

        Self {
            status: snapshot.status_at(now),
            data,
            error,
            updated_at: snapshot.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Fresh
    }

    pub fn is_stale(&self) -> bool {
        self.status == QueryStatus::Stale
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// The cached value, if any fetch has ever succeeded.
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}
