//! Reconciliation: folds a remote collection snapshot into the local cache.

use std::collections::HashSet;

use libsql::Connection;
use serde::Serialize;

use super::events::SyncEvent;
use super::manager::OfflineManager;
use crate::db::{LibSqlOutboxRepository, LibSqlRecordRepository, OutboxRepository, RecordRepository};
use crate::gateway::RemoteGateway;
use crate::models::{Fields, LocalId, Mutation, Record, RemoteDocument, ServerId, RESERVED_FIELDS};
use crate::Result;

/// What a reconciliation pass changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Remote documents hidden because their delete is still queued.
    pub suppressed: usize,
    /// Local records kept as-is because they have pending changes or were
    /// written while the snapshot was in flight.
    pub protected: usize,
}

/// Local changes a snapshot must not clobber: the collection's outbox plus
/// records written while the snapshot was in flight.
#[derive(Default)]
struct PendingChanges {
    deleted: HashSet<ServerId>,
    dirty_local: HashSet<LocalId>,
    dirty_remote: HashSet<ServerId>,
    /// Written locally after the snapshot was requested
    touched: HashSet<LocalId>,
}

impl PendingChanges {
    fn is_dirty(&self, record: &Record) -> bool {
        self.touched.contains(&record.local_id)
            || self.dirty_local.contains(&record.local_id)
            || record
                .server_id
                .as_ref()
                .is_some_and(|server_id| self.dirty_remote.contains(server_id))
    }
}

impl<G: RemoteGateway> OfflineManager<G> {
    /// Fetch a collection from the remote authority and merge it into the
    /// local cache.
    ///
    /// Remote failures are soft: they are logged and `Ok(None)` is returned
    /// with the cache untouched.
    pub async fn refresh_cache(&self, collection: &str) -> Result<Option<ReconcileStats>> {
        if !self.can_reach_remote() {
            tracing::debug!("Skipping refresh of {collection}: remote unreachable");
            return Ok(None);
        }

        let requested_at = {
            let db = self.inner.store.lock().await;
            LibSqlRecordRepository::new(db.connection()).write_seq().await?
        };
        let snapshot = match self.inner.gateway.fetch_collection(collection).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Cache refresh of {collection} failed: {e}");
                return Ok(None);
            }
        };

        let stats = {
            let db = self.inner.store.lock().await;
            db.begin().await?;
            let result =
                apply_snapshot(db.connection(), collection, snapshot, requested_at).await;
            db.finish(result).await?
        };

        tracing::debug!("Refreshed {collection}: {stats:?}");
        self.emit(SyncEvent::DataChanged {
            collection: Some(collection.to_string()),
        });
        Ok(Some(stats))
    }
}

async fn pending_changes(conn: &Connection, collection: &str) -> Result<PendingChanges> {
    let mut pending = PendingChanges::default();
    for entry in LibSqlOutboxRepository::new(conn)
        .list(Some(collection))
        .await?
    {
        match entry.mutation {
            Mutation::Delete(server_id) => {
                pending.deleted.insert(server_id);
            }
            Mutation::Create(snapshot) | Mutation::Update(snapshot) => {
                pending.dirty_local.insert(snapshot.local_id);
                if let Some(server_id) = snapshot.server_id {
                    pending.dirty_remote.insert(server_id);
                }
            }
        }
    }
    Ok(pending)
}

async fn apply_snapshot(
    conn: &Connection,
    collection: &str,
    snapshot: Vec<RemoteDocument>,
    requested_at: i64,
) -> Result<ReconcileStats> {
    let records = LibSqlRecordRepository::new(conn);
    let mut pending = pending_changes(conn, collection).await?;
    pending.touched = records.changed_after(collection, requested_at).await?;
    let mut stats = ReconcileStats::default();

    let mut incoming: Vec<(ServerId, Fields)> = Vec::with_capacity(snapshot.len());
    for document in snapshot {
        let Some(server_id) = document.server_id else {
            tracing::warn!("Ignoring {collection} document without _id");
            continue;
        };
        if pending.deleted.contains(&server_id) {
            stats.suppressed += 1;
            continue;
        }
        let mut fields = document.fields;
        for key in RESERVED_FIELDS {
            fields.remove(key);
        }
        incoming.push((server_id, fields));
    }
    let incoming_ids: HashSet<&ServerId> = incoming.iter().map(|(id, _)| id).collect();

    for record in records.list(collection).await? {
        let present = record
            .server_id
            .as_ref()
            .is_some_and(|server_id| incoming_ids.contains(server_id));
        if present {
            continue;
        }
        if pending.is_dirty(&record) {
            stats.protected += 1;
            continue;
        }
        records.delete(record.local_id).await?;
        stats.removed += 1;
    }

    for (server_id, fields) in incoming {
        match records.find_by_server_id(collection, &server_id).await? {
            Some(record) if pending.is_dirty(&record) => stats.protected += 1,
            Some(mut record) => {
                if record.fields != fields {
                    record.fields = fields;
                    records.update(&record).await?;
                    stats.updated += 1;
                }
            }
            None => {
                records.insert(collection, Some(&server_id), &fields).await?;
                stats.inserted += 1;
            }
        }
    }

    Ok(stats)
}
