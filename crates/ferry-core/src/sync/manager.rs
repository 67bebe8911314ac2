//! `OfflineManager`: the entry point tying the local store, outbox and
//! remote gateway together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use super::events::{SyncEvent, EVENT_CAPACITY};
use crate::gateway::RemoteGateway;
use crate::models::Record;
use crate::services::LocalStore;
use crate::state::SyncState;
use crate::Result;

/// Behaviour switches for an [`OfflineManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Spawn a background sync after writes and a background refresh after
    /// reads. When off, callers drive `sync_outbox` and `refresh_cache`.
    pub auto_sync: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { auto_sync: true }
    }
}

pub(super) struct Shared<G> {
    pub(super) store: LocalStore,
    pub(super) gateway: G,
    pub(super) options: EngineOptions,
    pub(super) online: AtomicBool,
    pub(super) simulate_offline: AtomicBool,
    pub(super) syncing: AtomicBool,
    pub(super) state: Mutex<SyncState>,
    pub(super) events: broadcast::Sender<SyncEvent>,
}

/// Local-first data manager.
///
/// Reads are served from the local store, writes land locally and in the
/// outbox before any network call. Clones share the same engine.
pub struct OfflineManager<G> {
    pub(super) inner: Arc<Shared<G>>,
}

impl<G> Clone for OfflineManager<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: RemoteGateway> OfflineManager<G> {
    pub fn new(store: LocalStore, gateway: G) -> Self {
        Self::with_options(store, gateway, EngineOptions::default())
    }

    pub fn with_options(store: LocalStore, gateway: G, options: EngineOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                store,
                gateway,
                options,
                online: AtomicBool::new(true),
                simulate_offline: AtomicBool::new(false),
                syncing: AtomicBool::new(false),
                state: Mutex::new(SyncState::default()),
                events,
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn options(&self) -> EngineOptions {
        self.inner.options
    }

    /// Receive `DataChanged` and `SyncProgress` events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Feed the external connectivity signal. Coming back online starts a sync.
    pub fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if !online {
            self.set_state(SyncState::Offline);
        } else if !was_online {
            tracing::info!("Connectivity restored");
            self.trigger_sync();
        }
    }

    pub fn is_simulating_offline(&self) -> bool {
        self.inner.simulate_offline.load(Ordering::SeqCst)
    }

    /// Pause the engine. A running cycle stops before its next entry.
    pub fn set_simulate_offline(&self, paused: bool) {
        let was_paused = self.inner.simulate_offline.swap(paused, Ordering::SeqCst);
        if paused {
            self.set_state(SyncState::Offline);
        } else if was_paused {
            self.trigger_sync();
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SyncState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a collection from the local cache.
    ///
    /// Returns immediately; when the remote is reachable a background refresh
    /// updates the cache for the next read.
    pub async fn get_collection(&self, collection: &str) -> Result<Vec<Record>> {
        let records = self.inner.store.list_records(collection).await?;
        self.trigger_refresh(collection);
        Ok(records)
    }

    pub(super) fn can_reach_remote(&self) -> bool {
        self.is_online() && !self.is_simulating_offline()
    }

    pub(super) fn set_state(&self, state: SyncState) {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(super) fn emit(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Start a sync cycle in the background if allowed.
    pub(super) fn trigger_sync(&self) {
        if !self.inner.options.auto_sync || !self.can_reach_remote() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping background sync");
            return;
        };

        let manager = self.clone();
        runtime.spawn(async move {
            match manager.sync_outbox().await {
                Err(e) if e.is_storage() => tracing::error!("Background sync failed: {e}"),
                Err(e) => tracing::warn!("Background sync failed: {e}"),
                Ok(_) => {}
            }
        });
    }

    pub(super) fn trigger_refresh(&self, collection: &str) {
        if !self.inner.options.auto_sync || !self.can_reach_remote() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping background refresh");
            return;
        };

        let manager = self.clone();
        let collection = collection.to_string();
        runtime.spawn(async move {
            if let Err(e) = manager.refresh_cache(&collection).await {
                tracing::warn!("Background refresh of {collection} failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    async fn manager() -> OfflineManager<MemoryGateway> {
        let store = LocalStore::open_in_memory().await.unwrap();
        OfflineManager::with_options(store, MemoryGateway::new(), EngineOptions { auto_sync: false })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flags_drive_reachability_and_state() {
        let manager = manager().await;
        assert!(manager.can_reach_remote());
        assert_eq!(manager.state(), SyncState::Synced);

        manager.set_online(false);
        assert!(!manager.can_reach_remote());
        assert_eq!(manager.state(), SyncState::Offline);

        manager.set_online(true);
        manager.set_simulate_offline(true);
        assert!(!manager.can_reach_remote());
        assert!(manager.is_simulating_offline());

        manager.set_simulate_offline(false);
        assert!(manager.can_reach_remote());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_collection_without_auto_sync_makes_no_remote_call() {
        let manager = manager().await;

        let records = manager.get_collection("items").await.unwrap();

        assert!(records.is_empty());
        assert!(manager.gateway().calls().is_empty());
    }

    #[test]
    fn default_options_enable_auto_sync() {
        assert!(EngineOptions::default().auto_sync);
    }
}
