//! ferry-core - Core library for Ferry
//!
//! Local-first record cache with a durable outbox. Reads and writes are served
//! from a libSQL store; a sync engine pushes queued mutations to a remote
//! authority and a reconciliation pass folds remote snapshots back in without
//! losing unsynced edits or resurrecting local deletes.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use gateway::{HttpGateway, MemoryGateway, RemoteError, RemoteGateway};
pub use models::{Document, Identity, LocalId, OutboxEntry, Record, ServerId};
pub use services::LocalStore;
pub use state::SyncState;
pub use sync::{EngineOptions, OfflineManager, ReconcileStats, SyncEvent, SyncOutcome, SyncReport};
