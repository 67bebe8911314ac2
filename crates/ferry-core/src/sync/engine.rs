//! Sync engine: drains the outbox against the remote gateway in order.

use std::sync::atomic::{AtomicBool, Ordering};

use libsql::Connection;
use serde::Serialize;

use super::events::SyncEvent;
use super::manager::OfflineManager;
use crate::db::{LibSqlOutboxRepository, LibSqlRecordRepository, OutboxRepository, RecordRepository};
use crate::gateway::RemoteGateway;
use crate::models::{Mutation, OutboxEntry, RecordSnapshot, RemoteDocument};
use crate::state::SyncState;
use crate::Result;

/// Why a sync cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The outbox is empty.
    Drained,
    /// A remote failure stopped the cycle; the failed entry stays at the head.
    Halted,
    /// Simulated offline was raised.
    Paused,
    /// The connectivity signal reports no network.
    Offline,
    /// Another cycle was already running; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Entries confirmed by the remote authority in this cycle.
    pub processed: usize,
    /// Entries still queued when the cycle ended.
    pub pending: usize,
}

/// Holds the engine's running flag; released on drop.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

enum Step {
    Advanced,
    Halt,
}

impl<G: RemoteGateway> OfflineManager<G> {
    /// Push pending outbox entries to the remote authority, oldest first.
    ///
    /// Stops at the first remote failure, leaving that entry and everything
    /// behind it queued. Only local storage failures are returned as errors.
    pub async fn sync_outbox(&self) -> Result<SyncReport> {
        let early = if self.is_simulating_offline() {
            Some(SyncOutcome::Paused)
        } else if !self.is_online() {
            Some(SyncOutcome::Offline)
        } else {
            None
        };
        if let Some(outcome) = early {
            return self.idle_report(outcome).await;
        }

        let Some(_guard) = CycleGuard::acquire(&self.inner.syncing) else {
            tracing::debug!("Sync cycle already running");
            return self.idle_report(SyncOutcome::AlreadyRunning).await;
        };

        self.set_state(SyncState::Syncing);
        let mut processed = 0;
        let result = self.drain(&mut processed).await;

        let state = match &result {
            Ok(SyncOutcome::Drained) => SyncState::Synced,
            Ok(SyncOutcome::Paused | SyncOutcome::Offline) => SyncState::Offline,
            Ok(SyncOutcome::Halted | SyncOutcome::AlreadyRunning) | Err(_) => SyncState::Error,
        };
        self.set_state(state);
        self.emit(SyncEvent::DataChanged { collection: None });

        let outcome = result?;
        let pending = self.inner.store.pending_count().await?;
        tracing::info!("Sync cycle {outcome:?}: {processed} processed, {pending} pending");
        Ok(SyncReport {
            outcome,
            processed,
            pending,
        })
    }

    async fn idle_report(&self, outcome: SyncOutcome) -> Result<SyncReport> {
        Ok(SyncReport {
            outcome,
            processed: 0,
            pending: self.inner.store.pending_count().await?,
        })
    }

    async fn drain(&self, processed: &mut usize) -> Result<SyncOutcome> {
        loop {
            if self.is_simulating_offline() {
                return Ok(SyncOutcome::Paused);
            }
            if !self.is_online() {
                return Ok(SyncOutcome::Offline);
            }

            let head = {
                let db = self.inner.store.lock().await;
                LibSqlOutboxRepository::new(db.connection()).head().await?
            };
            let Some(entry) = head else {
                return Ok(SyncOutcome::Drained);
            };

            match self.push_entry(&entry).await? {
                Step::Advanced => {
                    *processed += 1;
                    let pending = self.inner.store.pending_count().await?;
                    self.emit(SyncEvent::SyncProgress { pending });
                }
                Step::Halt => return Ok(SyncOutcome::Halted),
            }
        }
    }

    async fn push_entry(&self, entry: &OutboxEntry) -> Result<Step> {
        tracing::debug!(
            "Pushing outbox entry {} ({} {})",
            entry.id,
            entry.action(),
            entry.collection
        );

        match &entry.mutation {
            Mutation::Delete(server_id) => {
                if let Err(e) = self
                    .inner
                    .gateway
                    .delete_document(&entry.collection, server_id)
                    .await
                {
                    tracing::warn!("Remote delete of {}/{server_id} failed: {e}", entry.collection);
                    return Ok(Step::Halt);
                }
                let db = self.inner.store.lock().await;
                LibSqlOutboxRepository::new(db.connection())
                    .complete(entry.id, entry.revision)
                    .await?;
                Ok(Step::Advanced)
            }
            Mutation::Create(snapshot) | Mutation::Update(snapshot) => {
                let response = match self
                    .inner
                    .gateway
                    .save_document(&entry.collection, &snapshot.remote_payload())
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(
                            "Remote save of {}/{} failed: {e}",
                            entry.collection,
                            snapshot.local_id
                        );
                        return Ok(Step::Halt);
                    }
                };

                let db = self.inner.store.lock().await;
                db.begin().await?;
                let result = settle_save(db.connection(), entry, snapshot, response).await;
                db.finish(result).await
            }
        }
    }
}

/// Record the outcome of a confirmed save in the local store.
async fn settle_save(
    conn: &Connection,
    entry: &OutboxEntry,
    snapshot: &RecordSnapshot,
    response: RemoteDocument,
) -> Result<Step> {
    let outbox = LibSqlOutboxRepository::new(conn);
    if !matches!(entry.mutation, Mutation::Create(_)) {
        outbox.complete(entry.id, entry.revision).await?;
        return Ok(Step::Advanced);
    }

    let Some(server_id) = response.server_id else {
        tracing::warn!(
            "Create of {}/{} returned no _id; will retry",
            entry.collection,
            snapshot.local_id
        );
        return Ok(Step::Halt);
    };

    let assigned = LibSqlRecordRepository::new(conn)
        .assign_server_id(snapshot.local_id, &server_id)
        .await?;
    if !outbox.complete(entry.id, entry.revision).await? {
        // Edited while in flight: resend the newer state as an update.
        outbox.promote_to_update(entry.id, &server_id).await?;
    }
    if !assigned {
        tracing::debug!(
            "{}/{} was deleted during its create; removing remote copy {server_id}",
            entry.collection,
            snapshot.local_id
        );
        outbox
            .enqueue(&entry.collection, &Mutation::Delete(server_id))
            .await?;
    }
    Ok(Step::Advanced)
}
