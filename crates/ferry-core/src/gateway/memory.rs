//! In-process remote authority.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{payload_server_id, RemoteError, RemoteGateway, RemoteResult};
use crate::models::{Fields, RemoteDocument, ServerId};

/// One request observed by a [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Fetch { collection: String },
    Save { collection: String, payload: Fields },
    Delete { collection: String, server_id: ServerId },
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<ServerId, Fields>>,
    calls: Vec<GatewayCall>,
    next_id: u64,
    failing: bool,
    omit_ids: bool,
    latency: Option<Duration>,
    fetch_delay: Option<Duration>,
}

impl MemoryState {
    fn snapshot(&self, collection: &str) -> Vec<RemoteDocument> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| RemoteDocument::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Remote authority kept in memory: assigns ids, stores documents per
/// collection and records every call. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Store a document as if another client had created it.
    pub fn seed(&self, collection: &str, server_id: impl Into<ServerId>, fields: Fields) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(server_id.into(), fields);
    }

    /// Current remote contents of a collection.
    pub fn documents(&self, collection: &str) -> Vec<RemoteDocument> {
        self.state().snapshot(collection)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make every call fail as if the remote were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Answer creates without an `_id`.
    pub fn set_omit_ids(&self, omit_ids: bool) {
        self.state().omit_ids = omit_ids;
    }

    /// Delay every call by `latency` before it is handled.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Take fetch snapshots immediately but answer `delay` later, as if the
    /// response were still in transit.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state().fetch_delay = delay;
    }

    async fn delay(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record(&self, call: GatewayCall) -> RemoteResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing {
            return Err(RemoteError::Api {
                status: 503,
                message: "remote unavailable".to_string(),
            });
        }
        Ok(state)
    }
}

impl RemoteGateway for MemoryGateway {
    async fn fetch_collection(&self, collection: &str) -> RemoteResult<Vec<RemoteDocument>> {
        self.delay().await;
        let (documents, fetch_delay) = {
            let state = self.record(GatewayCall::Fetch {
                collection: collection.to_string(),
            })?;
            (state.snapshot(collection), state.fetch_delay)
        };
        if let Some(delay) = fetch_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(documents)
    }

    async fn save_document(
        &self,
        collection: &str,
        payload: &Fields,
    ) -> RemoteResult<RemoteDocument> {
        self.delay().await;
        let mut state = self.record(GatewayCall::Save {
            collection: collection.to_string(),
            payload: payload.clone(),
        })?;

        let mut fields = payload.clone();
        fields.remove("_id");
        let server_id = match payload_server_id(payload) {
            Some(server_id) => server_id,
            None => {
                state.next_id += 1;
                ServerId::new(format!("mem-{}", state.next_id))
            }
        };
        let omit_ids = state.omit_ids;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(server_id.clone(), fields.clone());

        Ok(RemoteDocument {
            server_id: (!omit_ids).then_some(server_id),
            fields,
        })
    }

    async fn delete_document(&self, collection: &str, server_id: &ServerId) -> RemoteResult<()> {
        self.delay().await;
        let mut state = self.record(GatewayCall::Delete {
            collection: collection.to_string(),
            server_id: server_id.clone(),
        })?;
        if let Some(docs) = state.collections.get_mut(collection) {
            docs.remove(server_id);
        }
        Ok(())
    }
}
