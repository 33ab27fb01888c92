// Query cache module.
// Cache keys, entries, descriptors, and the coordinator that ties them together.

pub mod coordinator;
pub mod descriptor;
pub mod entry;
pub mod key;
mod lock;
pub mod observer;

pub use coordinator::{CacheEvent, Coordinator, Subscription};
pub use descriptor::{MutationDescriptor, QueryDescriptor};
pub use entry::{QueryState, QueryStatus};
pub use key::{CacheKey, KeyPart};
pub use observer::QueryObserver;
