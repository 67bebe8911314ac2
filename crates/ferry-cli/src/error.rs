use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ferry_core::Error),
    #[error(transparent)]
    Remote(#[from] ferry_core::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Collection name cannot be empty")]
    EmptyCollection,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Invalid field assignment '{0}': expected KEY=VALUE")]
    InvalidAssignment(String),
    #[error("--json must be a JSON object")]
    NotAnObject,
    #[error("Nothing to save: pass --set KEY=VALUE or --json")]
    EmptyDocument,
    #[error(
        "Remote is not configured. Set FERRY_API_URL and FERRY_CLIENT_ID, or pass --memory-remote."
    )]
    RemoteNotConfigured,
}
