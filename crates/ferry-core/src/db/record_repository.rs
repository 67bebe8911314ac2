//! Record repository implementation

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{Fields, LocalId, Record, ServerId};
use libsql::Connection;

/// Trait for cached record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait RecordRepository {
    /// Get a record by its local id
    async fn get(&self, local_id: LocalId) -> Result<Option<Record>>;

    /// Find the record of a collection that references `server_id`
    async fn find_by_server_id(
        &self,
        collection: &str,
        server_id: &ServerId,
    ) -> Result<Option<Record>>;

    /// Find a record whose server id or local id equals `id` (string comparison)
    async fn find_by_any_id(&self, collection: &str, id: &str) -> Result<Option<Record>>;

    /// List all records of a collection in local id order
    async fn list(&self, collection: &str) -> Result<Vec<Record>>;

    /// Current value of the store-wide write counter
    async fn write_seq(&self) -> Result<i64>;

    /// Local ids of the collection's records written after the counter was at `seq`
    async fn changed_after(&self, collection: &str, seq: i64) -> Result<HashSet<LocalId>>;

    /// Insert a new record, assigning a fresh local id
    async fn insert(
        &self,
        collection: &str,
        server_id: Option<&ServerId>,
        fields: &Fields,
    ) -> Result<Record>;

    /// Overwrite an existing record's server id and fields
    async fn update(&self, record: &Record) -> Result<()>;

    /// Give a record its permanent identity.
    ///
    /// Any other record of the collection holding the same server id is removed
    /// first, so the identity stays unique. Returns `false` when the record no
    /// longer exists.
    async fn assign_server_id(&self, local_id: LocalId, server_id: &ServerId) -> Result<bool>;

    /// Delete a record; returns whether a row was removed
    async fn delete(&self, local_id: LocalId) -> Result<bool>;
}

/// libSQL implementation of `RecordRepository`
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &libsql::Row) -> Result<Record> {
        let fields: String = row.get(3)?;
        Ok(Record {
            local_id: LocalId::new(row.get(0)?),
            collection: row.get(1)?,
            server_id: row.get::<Option<String>>(2)?.map(ServerId::from),
            fields: parse_fields(&fields)?,
        })
    }

    async fn query_one(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Option<Record>> {
        let mut rows = self.conn.query(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }
}

/// Decode the JSON object stored in a `fields` column
pub(crate) fn parse_fields(raw: &str) -> Result<Fields> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(fields) => Ok(fields),
        _ => Err(Error::Database(format!(
            "stored fields are not a JSON object: {raw}"
        ))),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const SELECT_RECORD: &str = "SELECT local_id, collection, server_id, fields FROM records";

impl RecordRepository for LibSqlRecordRepository<'_> {
    async fn get(&self, local_id: LocalId) -> Result<Option<Record>> {
        self.query_one(
            &format!("{SELECT_RECORD} WHERE local_id = ?"),
            libsql::params![local_id.get()],
        )
        .await
    }

    async fn find_by_server_id(
        &self,
        collection: &str,
        server_id: &ServerId,
    ) -> Result<Option<Record>> {
        self.query_one(
            &format!("{SELECT_RECORD} WHERE collection = ? AND server_id = ?"),
            libsql::params![collection, server_id.as_str()],
        )
        .await
    }

    async fn find_by_any_id(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        // A server id match wins over a coincidental local id match
        self.query_one(
            &format!(
                "{SELECT_RECORD}
                 WHERE collection = ?1 AND (server_id = ?2 OR CAST(local_id AS TEXT) = ?2)
                 ORDER BY CASE WHEN server_id = ?2 THEN 0 ELSE 1 END
                 LIMIT 1"
            ),
            libsql::params![collection, id],
        )
        .await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_RECORD} WHERE collection = ? ORDER BY local_id"),
                [collection],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    async fn write_seq(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT seq FROM write_clock WHERE id = 1", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    async fn changed_after(&self, collection: &str, seq: i64) -> Result<HashSet<LocalId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT local_id FROM records WHERE collection = ? AND write_seq > ?",
                libsql::params![collection, seq],
            )
            .await?;

        let mut changed = HashSet::new();
        while let Some(row) = rows.next().await? {
            changed.insert(LocalId::new(row.get(0)?));
        }
        Ok(changed)
    }

    async fn insert(
        &self,
        collection: &str,
        server_id: Option<&ServerId>,
        fields: &Fields,
    ) -> Result<Record> {
        let encoded = serde_json::to_string(fields)?;
        self.conn
            .execute(
                "INSERT INTO records (collection, server_id, fields, updated_at) VALUES (?, ?, ?, ?)",
                libsql::params![
                    collection,
                    server_id.map(ToString::to_string),
                    encoded,
                    now_ms()
                ],
            )
            .await?;

        Ok(Record {
            local_id: LocalId::new(self.conn.last_insert_rowid()),
            server_id: server_id.cloned(),
            collection: collection.to_string(),
            fields: fields.clone(),
        })
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let encoded = serde_json::to_string(&record.fields)?;
        let rows = self
            .conn
            .execute(
                "UPDATE records SET server_id = ?, fields = ?, updated_at = ? WHERE local_id = ?",
                libsql::params![
                    record.server_id.as_ref().map(ToString::to_string),
                    encoded,
                    now_ms(),
                    record.local_id.get()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(record.local_id.to_string()));
        }
        Ok(())
    }

    async fn assign_server_id(&self, local_id: LocalId, server_id: &ServerId) -> Result<bool> {
        let Some(record) = self.get(local_id).await? else {
            return Ok(false);
        };

        self.conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND server_id = ? AND local_id != ?",
                libsql::params![record.collection, server_id.as_str(), local_id.get()],
            )
            .await?;

        let rows = self
            .conn
            .execute(
                "UPDATE records SET server_id = ?, updated_at = ? WHERE local_id = ?",
                libsql::params![server_id.as_str(), now_ms(), local_id.get()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete(&self, local_id: LocalId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE local_id = ?",
                libsql::params![local_id.get()],
            )
            .await?;
        Ok(rows > 0)
    }
}
