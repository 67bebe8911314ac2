//! Wire shape of records owned by the remote authority

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::record::{Fields, ServerId};

/// A record as returned by the remote authority.
///
/// `_id` is optional so that malformed responses still deserialize; callers
/// decide what a missing identity means.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteDocument {
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient_server_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_id: Option<ServerId>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RemoteDocument {
    #[must_use]
    pub const fn new(server_id: ServerId, fields: Fields) -> Self {
        Self {
            server_id: Some(server_id),
            fields,
        }
    }
}

/// Accept string or numeric ids; anything else is treated as missing.
fn lenient_server_id<'de, D>(deserializer: D) -> Result<Option<ServerId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(ServerId::new(text)),
        Some(Value::Number(number)) => Some(ServerId::new(number.to_string())),
        _ => None,
    })
}
