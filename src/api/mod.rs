// Dashboard API module.
// HTTP transport, REST paths, and typed endpoints for the summary bot dashboard.

pub mod client;
pub mod endpoints;
pub mod paths;
pub mod types;

pub use client::ApiClient;
pub use types::*;
