//! Data models for Ferry

mod outbox;
mod record;
mod remote;

pub use outbox::{Mutation, OutboxAction, OutboxEntry, OutboxId, RecordSnapshot};
pub use record::{Document, Fields, Identity, LocalId, Record, ServerId, RESERVED_FIELDS};
pub use remote::RemoteDocument;
