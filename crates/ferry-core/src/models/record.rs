//! Record model and identity types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Arbitrary structured payload of a record (the domain data).
pub type Fields = Map<String, Value>;

/// Keys reserved for identity and routing; never part of a record's fields.
pub const RESERVED_FIELDS: [&str; 3] = ["_id", "localId", "collection"];

/// Ephemeral identifier assigned by the local store on first persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(i64);

impl LocalId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw integer value as stored in the `records` table
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Permanent identifier assigned by the remote authority
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which identities are known for a record.
///
/// A persisted record is always `Local` or `Both`; a caller may also address
/// an already-synced record purely by its `Remote` id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Local(LocalId),
    Remote(ServerId),
    Both { local: LocalId, remote: ServerId },
}

impl Identity {
    /// Build an identity from optional parts; `None` when neither is known.
    #[must_use]
    pub fn from_parts(local: Option<LocalId>, remote: Option<ServerId>) -> Option<Self> {
        match (local, remote) {
            (Some(local), Some(remote)) => Some(Self::Both { local, remote }),
            (Some(local), None) => Some(Self::Local(local)),
            (None, Some(remote)) => Some(Self::Remote(remote)),
            (None, None) => None,
        }
    }

    #[must_use]
    pub const fn local_id(&self) -> Option<LocalId> {
        match self {
            Self::Local(local) | Self::Both { local, .. } => Some(*local),
            Self::Remote(_) => None,
        }
    }

    #[must_use]
    pub const fn server_id(&self) -> Option<&ServerId> {
        match self {
            Self::Remote(remote) | Self::Both { remote, .. } => Some(remote),
            Self::Local(_) => None,
        }
    }

    /// Attach (or replace) the remote identity.
    #[must_use]
    pub fn with_server_id(self, remote: ServerId) -> Self {
        match self {
            Self::Local(local) | Self::Both { local, .. } => Self::Both { local, remote },
            Self::Remote(_) => Self::Remote(remote),
        }
    }

    /// Attach (or replace) the local identity.
    #[must_use]
    pub fn with_local_id(self, local: LocalId) -> Self {
        match self {
            Self::Local(_) => Self::Local(local),
            Self::Remote(remote) | Self::Both { remote, .. } => Self::Both { local, remote },
        }
    }
}

/// Caller input to the write path: a payload plus whatever identity is known.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// `None` for a brand-new record
    pub identity: Option<Identity>,
    pub fields: Fields,
}

impl Document {
    /// A brand-new document with no known identity
    #[must_use]
    pub const fn new(fields: Fields) -> Self {
        Self {
            identity: None,
            fields,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Parse a JSON object, lifting `localId` and `_id` out of the payload.
    ///
    /// `localId` may be a number or a numeric string. The `collection` key is
    /// dropped since routing is decided by the caller.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::InvalidInput(
                "document must be a JSON object".to_string(),
            ));
        };

        let local = match fields.remove("localId") {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => match number.as_i64() {
                Some(value) => Some(LocalId::new(value)),
                None => {
                    return Err(Error::InvalidInput(format!(
                        "localId {number} is not an integer"
                    )))
                }
            },
            Some(Value::String(text)) => Some(text.parse::<LocalId>().map_err(|_| {
                Error::InvalidInput(format!("localId '{text}' is not an integer"))
            })?),
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "localId has unsupported type: {other}"
                )))
            }
        };
        let remote = match fields.remove("_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.trim().is_empty() => None,
            Some(Value::String(text)) => Some(ServerId::new(text)),
            Some(Value::Number(number)) => Some(ServerId::new(number.to_string())),
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "_id has unsupported type: {other}"
                )))
            }
        };
        fields.remove("collection");

        Ok(Self {
            identity: Identity::from_parts(local, remote),
            fields,
        })
    }

    /// Reject payloads that carry reserved keys.
    pub fn validate(&self) -> Result<()> {
        if let Some(key) = RESERVED_FIELDS
            .iter()
            .find(|key| self.fields.contains_key(**key))
        {
            return Err(Error::InvalidInput(format!(
                "field '{key}' is reserved and cannot be part of a document"
            )));
        }
        Ok(())
    }
}

/// A locally cached representation of one domain entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Assigned by the local store; always present once persisted
    #[serde(rename = "localId")]
    pub local_id: LocalId,
    /// Present iff the remote authority confirmed the record exists
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    /// Logical collection name
    pub collection: String,
    /// Domain payload
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    #[must_use]
    pub fn identity(&self) -> Identity {
        let local = Identity::Local(self.local_id);
        match &self.server_id {
            Some(remote) => local.with_server_id(remote.clone()),
            None => local,
        }
    }

    /// Whether the remote authority has confirmed this record
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    /// The conventional `title` field, when it is a string
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}
