//! Outbox repository implementation

use crate::error::{Error, Result};
use crate::models::{
    LocalId, Mutation, OutboxAction, OutboxEntry, OutboxId, RecordSnapshot, ServerId,
};
use libsql::Connection;

use super::record_repository::parse_fields;

/// Trait for pending-mutation queue operations (async)
#[allow(async_fn_in_trait)]
pub trait OutboxRepository {
    /// Oldest pending entry, if any
    async fn head(&self) -> Result<Option<OutboxEntry>>;

    /// All pending entries in insertion order, optionally restricted to a collection
    async fn list(&self, collection: Option<&str>) -> Result<Vec<OutboxEntry>>;

    /// Number of pending entries
    async fn count(&self) -> Result<usize>;

    /// The pending create/update entry for a record, if any
    async fn find_upsert(&self, collection: &str, local_id: LocalId)
        -> Result<Option<OutboxEntry>>;

    /// Append a new entry at the tail of the queue
    async fn enqueue(&self, collection: &str, mutation: &Mutation) -> Result<OutboxId>;

    /// Replace an entry's mutation in place, keeping its queue position
    async fn coalesce(&self, id: OutboxId, mutation: &Mutation) -> Result<()>;

    /// Remove an entry if it still has the given revision; returns whether it was removed
    async fn complete(&self, id: OutboxId, revision: i64) -> Result<bool>;

    /// Turn a pending create into an update once its server id is known
    async fn promote_to_update(&self, id: OutboxId, server_id: &ServerId) -> Result<()>;

    /// Drop every create/update entry for a record; returns the number removed
    async fn remove_upserts(&self, collection: &str, local_id: LocalId) -> Result<usize>;
}

/// libSQL implementation of `OutboxRepository`
pub struct LibSqlOutboxRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOutboxRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an outbox entry from a database row
    fn parse_entry(row: &libsql::Row) -> Result<OutboxEntry> {
        let id = OutboxId::new(row.get(0)?);
        let action: String = row.get(1)?;
        let action = action
            .parse::<OutboxAction>()
            .map_err(Error::Database)?;
        let local_id = row.get::<Option<i64>>(3)?.map(LocalId::new);
        let server_id = row.get::<Option<String>>(4)?.map(ServerId::from);
        let fields = row.get::<Option<String>>(5)?;

        let mutation = match action {
            OutboxAction::Delete => Mutation::Delete(server_id.ok_or_else(|| {
                Error::Database(format!("outbox entry {id} is a delete without server id"))
            })?),
            OutboxAction::Create | OutboxAction::Update => {
                let local_id = local_id.ok_or_else(|| {
                    Error::Database(format!("outbox entry {id} has no local id"))
                })?;
                let snapshot = RecordSnapshot {
                    local_id,
                    server_id,
                    fields: parse_fields(fields.as_deref().unwrap_or("{}"))?,
                };
                if action == OutboxAction::Create {
                    Mutation::Create(snapshot)
                } else {
                    Mutation::Update(snapshot)
                }
            }
        };

        Ok(OutboxEntry {
            id,
            collection: row.get(2)?,
            mutation,
            revision: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    async fn collect(&self, rows: &mut libsql::Rows) -> Result<Vec<OutboxEntry>> {
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }
}

/// Column values persisted for a mutation: (local_id, server_id, fields)
fn mutation_columns(mutation: &Mutation) -> Result<(Option<i64>, Option<String>, Option<String>)> {
    let fields = match mutation.snapshot() {
        Some(snapshot) => Some(serde_json::to_string(&snapshot.fields)?),
        None => None,
    };
    Ok((
        mutation.local_id().map(LocalId::get),
        mutation.server_id().map(ToString::to_string),
        fields,
    ))
}

const SELECT_ENTRY: &str =
    "SELECT id, action, collection, local_id, server_id, fields, revision, created_at FROM outbox";

impl OutboxRepository for LibSqlOutboxRepository<'_> {
    async fn head(&self) -> Result<Option<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_ENTRY} ORDER BY id LIMIT 1"), ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: Option<&str>) -> Result<Vec<OutboxEntry>> {
        let mut rows = match collection {
            Some(collection) => {
                self.conn
                    .query(
                        &format!("{SELECT_ENTRY} WHERE collection = ? ORDER BY id"),
                        [collection],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(&format!("{SELECT_ENTRY} ORDER BY id"), ())
                    .await?
            }
        };
        self.collect(&mut rows).await
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM outbox", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_upsert(
        &self,
        collection: &str,
        local_id: LocalId,
    ) -> Result<Option<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "{SELECT_ENTRY}
                     WHERE collection = ? AND local_id = ? AND action != 'delete'
                     ORDER BY id LIMIT 1"
                ),
                libsql::params![collection, local_id.get()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn enqueue(&self, collection: &str, mutation: &Mutation) -> Result<OutboxId> {
        let (local_id, server_id, fields) = mutation_columns(mutation)?;
        self.conn
            .execute(
                "INSERT INTO outbox (action, collection, local_id, server_id, fields, revision, created_at)
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
                libsql::params![
                    mutation.action().as_str(),
                    collection,
                    local_id,
                    server_id,
                    fields,
                    chrono::Utc::now().timestamp_millis()
                ],
            )
            .await?;
        Ok(OutboxId::new(self.conn.last_insert_rowid()))
    }

    async fn coalesce(&self, id: OutboxId, mutation: &Mutation) -> Result<()> {
        let (local_id, server_id, fields) = mutation_columns(mutation)?;
        let rows = self
            .conn
            .execute(
                "UPDATE outbox
                 SET action = ?, local_id = ?, server_id = ?, fields = ?, revision = revision + 1
                 WHERE id = ?",
                libsql::params![
                    mutation.action().as_str(),
                    local_id,
                    server_id,
                    fields,
                    id.get()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("outbox entry {id}")));
        }
        Ok(())
    }

    async fn complete(&self, id: OutboxId, revision: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM outbox WHERE id = ? AND revision = ?",
                libsql::params![id.get(), revision],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn promote_to_update(&self, id: OutboxId, server_id: &ServerId) -> Result<()> {
        self.conn
            .execute(
                "UPDATE outbox SET action = 'update', server_id = ?
                 WHERE id = ? AND action = 'create'",
                libsql::params![server_id.as_str(), id.get()],
            )
            .await?;
        Ok(())
    }

    async fn remove_upserts(&self, collection: &str, local_id: LocalId) -> Result<usize> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM outbox WHERE collection = ? AND local_id = ? AND action != 'delete'",
                libsql::params![collection, local_id.get()],
            )
            .await?;
        usize::try_from(rows).map_err(|e| Error::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Fields;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn create(local_id: i64, title: &str) -> Mutation {
        let serde_json::Value::Object(fields) = json!({ "title": title }) else {
            unreachable!()
        };
        Mutation::Create(RecordSnapshot {
            local_id: LocalId::new(local_id),
            server_id: None,
            fields,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entries_come_back_in_insertion_order() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        let first = repo.enqueue("items", &create(1, "A")).await.unwrap();
        let second = repo
            .enqueue("items", &Mutation::Delete(ServerId::from("S1")))
            .await
            .unwrap();
        let third = repo.enqueue("other", &create(2, "B")).await.unwrap();

        let ids = repo
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(repo.head().await.unwrap().unwrap().id, first);
        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.list(Some("other")).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutation_survives_persistence() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        let mutation = create(4, "A");
        repo.enqueue("items", &mutation).await.unwrap();
        repo.enqueue("items", &Mutation::Delete(ServerId::from("S9")))
            .await
            .unwrap();

        let entries = repo.list(None).await.unwrap();
        assert_eq!(entries[0].mutation, mutation);
        assert_eq!(entries[0].revision, 0);
        assert_eq!(entries[1].mutation, Mutation::Delete(ServerId::from("S9")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn coalesce_keeps_position_and_bumps_revision() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        let id = repo.enqueue("items", &create(1, "A")).await.unwrap();
        repo.enqueue("items", &create(2, "other")).await.unwrap();
        repo.coalesce(id, &create(1, "A2")).await.unwrap();

        let head = repo.head().await.unwrap().unwrap();
        assert_eq!(head.id, id);
        assert_eq!(head.revision, 1);
        assert_eq!(head.mutation, create(1, "A2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn complete_requires_matching_revision() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        let id = repo.enqueue("items", &create(1, "A")).await.unwrap();
        repo.coalesce(id, &create(1, "B")).await.unwrap();

        assert!(!repo.complete(id, 0).await.unwrap());
        assert!(repo.complete(id, 1).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn find_and_remove_upserts_ignore_deletes() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        repo.enqueue("items", &create(1, "A")).await.unwrap();
        repo.enqueue("items", &Mutation::Delete(ServerId::from("S1")))
            .await
            .unwrap();

        assert!(repo
            .find_upsert("items", LocalId::new(1))
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_upsert("other", LocalId::new(1))
            .await
            .unwrap()
            .is_none());

        assert_eq!(repo.remove_upserts("items", LocalId::new(1)).await.unwrap(), 1);
        let remaining = repo.list(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].action(), OutboxAction::Delete);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn promote_to_update_attaches_server_id() {
        let db = setup().await;
        let repo = LibSqlOutboxRepository::new(db.connection());

        let id = repo.enqueue("items", &create(1, "A")).await.unwrap();
        repo.promote_to_update(id, &ServerId::from("S1")).await.unwrap();

        let entry = repo.head().await.unwrap().unwrap();
        assert_eq!(entry.action(), OutboxAction::Update);
        assert_eq!(entry.mutation.server_id(), Some(&ServerId::from("S1")));
        assert_eq!(
            entry.mutation.snapshot().map(|s| s.fields.clone()),
            Some({
                let mut fields = Fields::new();
                fields.insert("title".to_string(), json!("A"));
                fields
            })
        );
    }
}
