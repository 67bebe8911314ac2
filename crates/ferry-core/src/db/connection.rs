//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for libSQL connections
pub struct Database {
    // Dropping the handle would invalidate in-memory databases.
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for durability and reasonable write throughput
    async fn configure(&self) -> Result<()> {
        // In-memory databases reject WAL; that is fine.
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction on this connection
    pub async fn begin(&self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        Ok(())
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and pass the result through.
    pub async fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    async fn count_rows(db: &Database) -> i64 {
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM records", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(count_rows(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finish_rolls_back_on_error() {
        let db = Database::open_in_memory().await.unwrap();

        db.begin().await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO records (collection, fields, updated_at) VALUES ('items', '{}', 0)",
                (),
            )
            .await
            .unwrap();
        let result: Result<()> = Err(Error::InvalidInput("abort".to_string()));
        assert!(db.finish(result).await.is_err());

        assert_eq!(count_rows(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finish_commits_on_success() {
        let db = Database::open_in_memory().await.unwrap();

        db.begin().await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO records (collection, fields, updated_at) VALUES ('items', '{}', 0)",
                (),
            )
            .await
            .unwrap();
        db.finish(Ok(())).await.unwrap();

        assert_eq!(count_rows(&db).await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn data_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ferry.db");

        {
            let db = Database::open(&path).await.unwrap();
            db.connection()
                .execute(
                    "INSERT INTO records (collection, fields, updated_at) VALUES ('items', '{}', 0)",
                    (),
                )
                .await
                .unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        assert_eq!(count_rows(&db).await, 1);
    }
}
