//! Change notifications delivered to subscribers.

use serde::Serialize;

/// Events published on the manager's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Local data changed. `collection` is `None` after a sync cycle, which may
    /// touch several collections.
    DataChanged { collection: Option<String> },
    /// The outbox shrank during a sync cycle.
    SyncProgress { pending: usize },
}

pub(crate) const EVENT_CAPACITY: usize = 64;
