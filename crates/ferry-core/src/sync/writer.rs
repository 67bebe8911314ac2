//! Write path: optimistic local saves and deletes feeding the outbox.

use libsql::Connection;

use super::events::SyncEvent;
use super::manager::OfflineManager;
use crate::db::{LibSqlOutboxRepository, LibSqlRecordRepository, OutboxRepository, RecordRepository};
use crate::gateway::RemoteGateway;
use crate::models::{Document, Identity, Mutation, Record, RecordSnapshot, ServerId};
use crate::{Error, Result};

impl<G: RemoteGateway> OfflineManager<G> {
    /// Persist a document locally and queue it for the remote authority.
    ///
    /// The returned record carries its local id. The network is never awaited;
    /// a background sync is started when the remote is reachable.
    pub async fn save_document(&self, collection: &str, document: Document) -> Result<Record> {
        document.validate()?;

        let record = {
            let db = self.inner.store.lock().await;
            db.begin().await?;
            let result = apply_save(db.connection(), collection, document).await;
            db.finish(result).await?
        };

        tracing::debug!(
            "Saved {collection}/{} (server id: {:?})",
            record.local_id,
            record.server_id.as_ref().map(ServerId::as_str)
        );
        self.emit(SyncEvent::DataChanged {
            collection: Some(collection.to_string()),
        });
        self.trigger_sync();
        Ok(record)
    }

    /// Remove a record locally and queue the remote delete when needed.
    ///
    /// `id` may be either a local id or a server id.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let removed = {
            let db = self.inner.store.lock().await;
            db.begin().await?;
            let result = apply_delete(db.connection(), collection, id).await;
            db.finish(result).await?
        };

        if removed {
            self.emit(SyncEvent::DataChanged {
                collection: Some(collection.to_string()),
            });
        }
        self.trigger_sync();
        Ok(())
    }
}

async fn apply_save(conn: &Connection, collection: &str, document: Document) -> Result<Record> {
    let records = LibSqlRecordRepository::new(conn);
    let Document { identity, fields } = document;

    let existing = match &identity {
        None => None,
        Some(Identity::Local(local) | Identity::Both { local, .. }) => {
            let record = records
                .get(*local)
                .await?
                .filter(|record| record.collection == collection)
                .ok_or_else(|| Error::NotFound(format!("{collection}/{local}")))?;
            Some(record)
        }
        Some(Identity::Remote(remote)) => records.find_by_server_id(collection, remote).await?,
    };

    // The stored identity wins: a sync may have confirmed the record since the
    // caller read it.
    let server_id = existing
        .as_ref()
        .and_then(|record| record.server_id.clone())
        .or_else(|| identity.as_ref().and_then(Identity::server_id).cloned());

    if let (Some(record), Some(server_id)) = (&existing, &server_id) {
        if record.server_id.is_none() {
            if let Some(owner) = records.find_by_server_id(collection, server_id).await? {
                return Err(Error::InvalidInput(format!(
                    "{collection}/{server_id} already belongs to local record {}",
                    owner.local_id
                )));
            }
        }
    }

    let record = match existing {
        Some(mut record) => {
            record.server_id = server_id;
            record.fields = fields;
            records.update(&record).await?;
            record
        }
        None => records.insert(collection, server_id.as_ref(), &fields).await?,
    };

    let outbox = LibSqlOutboxRepository::new(conn);
    let mutation = Mutation::upsert(RecordSnapshot::from(&record));
    match outbox.find_upsert(collection, record.local_id).await? {
        Some(entry) => outbox.coalesce(entry.id, &mutation).await?,
        None => {
            outbox.enqueue(collection, &mutation).await?;
        }
    }

    Ok(record)
}

/// Returns whether a local record was removed.
async fn apply_delete(conn: &Connection, collection: &str, id: &str) -> Result<bool> {
    let records = LibSqlRecordRepository::new(conn);
    let outbox = LibSqlOutboxRepository::new(conn);

    let Some(record) = records.find_by_any_id(collection, id).await? else {
        let id = id.trim();
        if !id.is_empty() && id.parse::<i64>().is_err() {
            tracing::debug!("Queueing delete of {collection}/{id} known only remotely");
            outbox
                .enqueue(collection, &Mutation::Delete(ServerId::new(id)))
                .await?;
        }
        return Ok(false);
    };

    records.delete(record.local_id).await?;
    // Pending creates or updates are moot once the record is gone.
    outbox.remove_upserts(collection, record.local_id).await?;
    if let Some(server_id) = record.server_id {
        outbox
            .enqueue(collection, &Mutation::Delete(server_id))
            .await?;
    }
    Ok(true)
}
