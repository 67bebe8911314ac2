pub mod common;
pub mod completions;
pub mod delete;
pub mod list;
pub mod outbox;
pub mod put;
pub mod status;
pub mod sync;
