// Resource bindings.
// Cache keys, query descriptors and mutation descriptors for each dashboard resource family.

pub mod feeds;
pub mod guilds;
pub mod health;
pub mod prompts;
pub mod schedules;
pub mod summaries;

/// Input for mutations that act on one item of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate<B> {
    pub id: String,
    pub body: B,
}

impl<B> ItemUpdate<B> {
    pub fn new(id: impl Into<String>, body: B) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// A required identifier, treating the empty string as missing.
pub(crate) fn present(id: Option<&str>) -> Option<&str> {
    id.filter(|value| !value.is_empty())
}
