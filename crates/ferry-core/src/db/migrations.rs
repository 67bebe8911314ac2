//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: records cache and outbox queue
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // AUTOINCREMENT keeps local ids monotonic and never reused
        "CREATE TABLE IF NOT EXISTS records (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            server_id TEXT,
            fields TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_records_server_id
            ON records(collection, server_id) WHERE server_id IS NOT NULL",
        "CREATE TABLE IF NOT EXISTS outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL CHECK (action IN ('create', 'update', 'delete')),
            collection TEXT NOT NULL,
            local_id INTEGER,
            server_id TEXT,
            fields TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_outbox_local ON outbox(collection, local_id)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

/// Migration to version 2: write counter stamped on every record write
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS write_clock (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            seq INTEGER NOT NULL
        )",
        "INSERT OR IGNORE INTO write_clock (id, seq) VALUES (1, 0)",
        "ALTER TABLE records ADD COLUMN write_seq INTEGER NOT NULL DEFAULT 0",
        "CREATE INDEX IF NOT EXISTS idx_records_write_seq ON records(collection, write_seq)",
        "CREATE TRIGGER IF NOT EXISTS records_stamp_insert AFTER INSERT ON records
         FOR EACH ROW
         BEGIN
             UPDATE write_clock SET seq = seq + 1 WHERE id = 1;
             UPDATE records SET write_seq = (SELECT seq FROM write_clock WHERE id = 1)
             WHERE local_id = NEW.local_id;
         END",
        "CREATE TRIGGER IF NOT EXISTS records_stamp_update
         AFTER UPDATE OF server_id, fields ON records
         FOR EACH ROW
         BEGIN
             UPDATE write_clock SET seq = seq + 1 WHERE id = 1;
             UPDATE records SET write_seq = (SELECT seq FROM write_clock WHERE id = 1)
             WHERE local_id = NEW.local_id;
         END",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
