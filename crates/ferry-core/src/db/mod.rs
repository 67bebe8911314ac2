//! Database layer for Ferry

mod connection;
mod migrations;
mod outbox_repository;
mod record_repository;

pub use connection::Database;
pub use outbox_repository::{LibSqlOutboxRepository, OutboxRepository};
pub use record_repository::{LibSqlRecordRepository, RecordRepository};
