//! Shared local store wrapper used by the write path and both engines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    Database, LibSqlOutboxRepository, LibSqlRecordRepository, OutboxRepository, RecordRepository,
};
use crate::models::{LocalId, OutboxEntry, Record};
use crate::Result;

/// Thread-safe handle to the `records` and `outbox` tables.
///
/// All mutations go through one connection guarded by an async mutex, so
/// multi-step operations that hold the guard are serialized.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Take exclusive access to the database for a multi-step operation.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    /// Records currently cached for a collection.
    pub async fn list_records(&self, collection: &str) -> Result<Vec<Record>> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .list(collection)
            .await
    }

    /// Fetch a record by local id.
    pub async fn get_record(&self, local_id: LocalId) -> Result<Option<Record>> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .get(local_id)
            .await
    }

    /// Pending outbox entries in processing order.
    pub async fn list_outbox(&self, collection: Option<&str>) -> Result<Vec<OutboxEntry>> {
        let db = self.db.lock().await;
        LibSqlOutboxRepository::new(db.connection())
            .list(collection)
            .await
    }

    /// Number of pending outbox entries.
    pub async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlOutboxRepository::new(db.connection()).count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_store_starts_empty() {
        let store = LocalStore::open_in_memory().await.unwrap();

        assert!(store.path().is_none());
        assert!(store.list_records("items").await.unwrap().is_empty());
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("ferry.db");

        let store = LocalStore::open_path(&db_path).await.unwrap();

        assert!(db_path.exists());
        assert_eq!(store.path(), Some(db_path.as_path()));
    }
}
