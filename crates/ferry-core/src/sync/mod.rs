//! Offline-first sync engine.
//!
//! Writes land in the local store and the outbox first; the engine drains the
//! outbox against a [`RemoteGateway`](crate::gateway::RemoteGateway) and folds
//! remote snapshots back into the cache without resurrecting local deletes.

mod engine;
mod events;
mod manager;
mod reconcile;
mod writer;

#[cfg(test)]
mod test_support;

pub use engine::{SyncOutcome, SyncReport};
pub use events::SyncEvent;
pub use manager::{EngineOptions, OfflineManager};
pub use reconcile::ReconcileStats;
