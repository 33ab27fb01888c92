// summary-sync library.
// Query cache coordinator and typed REST bindings for the summary bot dashboard.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod queries;
pub mod telemetry;

pub use api::ApiClient;
pub use cache::{
    CacheEvent, CacheKey, Coordinator, KeyPart, MutationDescriptor, QueryDescriptor,
    QueryObserver, QueryState, QueryStatus, Subscription,
};
pub use config::Config;
pub use error::{Result, SyncError};
