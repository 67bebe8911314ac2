//! Remote authority access.
//!
//! The sync and reconciliation engines only talk to the remote side through
//! [`RemoteGateway`]. [`HttpGateway`] speaks the REST API; [`MemoryGateway`]
//! keeps everything in-process.

mod http;
mod memory;

use std::future::Future;

use thiserror::Error;

use crate::models::{Fields, RemoteDocument, ServerId};

pub use http::HttpGateway;
pub use memory::{GatewayCall, MemoryGateway};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Gateway HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gateway API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Invalid gateway payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations offered by the remote authority.
///
/// `collection` is the logical name; implementations resolve it to the final
/// wire name themselves.
pub trait RemoteGateway: Send + Sync + 'static {
    /// Fetch the full snapshot of a collection.
    fn fetch_collection(
        &self,
        collection: &str,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteDocument>>> + Send;

    /// Create (no `_id` in `payload`) or overwrite (with `_id`) a document.
    fn save_document(
        &self,
        collection: &str,
        payload: &Fields,
    ) -> impl Future<Output = RemoteResult<RemoteDocument>> + Send;

    fn delete_document(
        &self,
        collection: &str,
        server_id: &ServerId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// The `_id` carried by an outgoing payload, if any.
pub(crate) fn payload_server_id(payload: &Fields) -> Option<ServerId> {
    match payload.get("_id")? {
        serde_json::Value::String(text) if !text.trim().is_empty() => {
            Some(ServerId::new(text.as_str()))
        }
        serde_json::Value::Number(number) => Some(ServerId::new(number.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    #[test]
    fn payload_server_id_reads_string_and_number() {
        assert_eq!(
            payload_server_id(&fields(json!({ "_id": "S1" }))),
            Some(ServerId::from("S1"))
        );
        assert_eq!(
            payload_server_id(&fields(json!({ "_id": 7 }))),
            Some(ServerId::from("7"))
        );
        assert_eq!(payload_server_id(&fields(json!({ "_id": "" }))), None);
        assert_eq!(payload_server_id(&fields(json!({ "title": "A" }))), None);
    }

    #[test]
    fn api_error_display_includes_status() {
        let err = RemoteError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert_eq!(err.to_string(), "Gateway API error: down (503)");
    }
}
