//! Outbox entry model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::record::{Fields, LocalId, Record, ServerId};

/// Persisted discriminant of a pending mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxAction {
    /// First remote write of a record (POST)
    Create,
    /// Overwrite of an already-synced record (PUT)
    Update,
    /// Remote removal of an already-synced record
    Delete,
}

impl OutboxAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OutboxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown outbox action '{other}'")),
        }
    }
}

/// Insertion-ordered outbox key; defines processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxId(i64);

impl OutboxId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OutboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a record captured at write time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(rename = "localId")]
    pub local_id: LocalId,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RecordSnapshot {
    /// Payload for the remote authority: local-only keys stripped, `_id` kept when known.
    #[must_use]
    pub fn remote_payload(&self) -> Fields {
        let mut payload = self.fields.clone();
        if let Some(server_id) = &self.server_id {
            payload.insert("_id".to_string(), Value::String(server_id.to_string()));
        }
        payload
    }
}

impl From<&Record> for RecordSnapshot {
    fn from(record: &Record) -> Self {
        Self {
            local_id: record.local_id,
            server_id: record.server_id.clone(),
            fields: record.fields.clone(),
        }
    }
}

/// One pending mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Mutation {
    Create(RecordSnapshot),
    Update(RecordSnapshot),
    Delete(ServerId),
}

impl Mutation {
    /// `Update` when the snapshot already has a remote identity, `Create` otherwise.
    #[must_use]
    pub fn upsert(snapshot: RecordSnapshot) -> Self {
        if snapshot.server_id.is_some() {
            Self::Update(snapshot)
        } else {
            Self::Create(snapshot)
        }
    }

    #[must_use]
    pub const fn action(&self) -> OutboxAction {
        match self {
            Self::Create(_) => OutboxAction::Create,
            Self::Update(_) => OutboxAction::Update,
            Self::Delete(_) => OutboxAction::Delete,
        }
    }

    #[must_use]
    pub const fn snapshot(&self) -> Option<&RecordSnapshot> {
        match self {
            Self::Create(snapshot) | Self::Update(snapshot) => Some(snapshot),
            Self::Delete(_) => None,
        }
    }

    #[must_use]
    pub const fn local_id(&self) -> Option<LocalId> {
        match self.snapshot() {
            Some(snapshot) => Some(snapshot.local_id),
            None => None,
        }
    }

    #[must_use]
    pub fn server_id(&self) -> Option<&ServerId> {
        match self {
            Self::Create(snapshot) | Self::Update(snapshot) => snapshot.server_id.as_ref(),
            Self::Delete(server_id) => Some(server_id),
        }
    }
}

/// A durable, ordered record of one pending mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxEntry {
    pub id: OutboxId,
    pub collection: String,
    #[serde(flatten)]
    pub mutation: Mutation,
    /// Bumped every time a later edit is coalesced into this entry
    pub revision: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl OutboxEntry {
    #[must_use]
    pub const fn action(&self) -> OutboxAction {
        self.mutation.action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(server_id: Option<&str>) -> RecordSnapshot {
        let Value::Object(fields) = json!({ "title": "A" }) else {
            unreachable!()
        };
        RecordSnapshot {
            local_id: LocalId::new(1),
            server_id: server_id.map(ServerId::from),
            fields,
        }
    }

    #[test]
    fn upsert_picks_action_from_identity() {
        assert_eq!(
            Mutation::upsert(snapshot(None)).action(),
            OutboxAction::Create
        );
        assert_eq!(
            Mutation::upsert(snapshot(Some("S1"))).action(),
            OutboxAction::Update
        );
    }

    #[test]
    fn remote_payload_strips_local_keys() {
        let payload = snapshot(Some("S1")).remote_payload();
        assert_eq!(Value::Object(payload), json!({ "title": "A", "_id": "S1" }));

        let payload = snapshot(None).remote_payload();
        assert_eq!(Value::Object(payload), json!({ "title": "A" }));
    }

    #[test]
    fn action_parses_its_own_labels() {
        for action in [
            OutboxAction::Create,
            OutboxAction::Update,
            OutboxAction::Delete,
        ] {
            assert_eq!(action.as_str().parse::<OutboxAction>(), Ok(action));
        }
        assert!("put".parse::<OutboxAction>().is_err());
    }

    #[test]
    fn mutation_exposes_correlation_keys() {
        let delete = Mutation::Delete(ServerId::from("S3"));
        assert_eq!(delete.local_id(), None);
        assert_eq!(delete.server_id(), Some(&ServerId::from("S3")));

        let create = Mutation::Create(snapshot(None));
        assert_eq!(create.local_id(), Some(LocalId::new(1)));
        assert_eq!(create.server_id(), None);
    }
}
