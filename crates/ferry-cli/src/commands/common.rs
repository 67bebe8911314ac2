use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ferry_core::models::{Fields, Mutation};
use ferry_core::{
    Document, EngineOptions, Identity, LocalId, LocalStore, OfflineManager, OutboxEntry, Record,
    ServerId, SyncOutcome, SyncReport,
};
use serde_json::Value;

use crate::error::CliError;
use crate::remote::CliGateway;

pub type Manager = OfflineManager<CliGateway>;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("FERRY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ferry")
        .join("ferry.db")
}

/// Open the local store and wrap it in a manager that never syncs on its own.
pub async fn open_manager(
    db_path: &Path,
    gateway: CliGateway,
    offline: bool,
) -> Result<Manager, CliError> {
    let store = LocalStore::open_path(db_path).await?;
    let reachable = gateway.is_configured() && !offline;
    let manager = OfflineManager::with_options(store, gateway, EngineOptions { auto_sync: false });
    manager.set_online(reachable);
    Ok(manager)
}

/// Push whatever the last command queued, if the remote is reachable.
pub async fn flush_outbox(manager: &Manager) -> Result<Option<SyncReport>, CliError> {
    if !manager.is_online() {
        return Ok(None);
    }
    Ok(Some(manager.sync_outbox().await?))
}

pub fn normalize_collection(collection: &str) -> Result<String, CliError> {
    let trimmed = collection.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCollection)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_record_id(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Integers address local ids, anything else a server id.
pub fn parse_identity(id: &str) -> Identity {
    id.parse::<LocalId>()
        .map_or_else(|_| Identity::Remote(ServerId::new(id)), Identity::Local)
}

/// Split `KEY=VALUE`; the value is JSON when it parses, a string otherwise.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidAssignment(raw.to_string()));
    }

    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn build_document(
    id: Option<&str>,
    json: Option<&str>,
    assignments: &[String],
) -> Result<Document, CliError> {
    let mut document = match json {
        Some(raw) => {
            let value = serde_json::from_str::<Value>(raw)?;
            if !value.is_object() {
                return Err(CliError::NotAnObject);
            }
            Document::from_value(value)?
        }
        None => Document::default(),
    };
    for raw in assignments {
        let (key, value) = parse_assignment(raw)?;
        document.fields.insert(key, value);
    }
    if document.fields.is_empty() {
        return Err(CliError::EmptyDocument);
    }

    if let Some(id) = id {
        document.identity = Some(parse_identity(&normalize_record_id(id)?));
    }
    Ok(document)
}

pub fn fields_preview(fields: &Fields, max_chars: usize) -> String {
    let rendered = Value::Object(fields.clone()).to_string();
    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = rendered.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let local_id = record.local_id.to_string();
            let server_id = record
                .server_id
                .as_ref()
                .map_or_else(|| "(unsynced)".to_string(), ToString::to_string);
            let preview = fields_preview(&record.fields, 60);
            format!("{local_id:<6}  {server_id:<24}  {preview}")
        })
        .collect()
}

pub fn format_outbox_lines(entries: &[OutboxEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let id = entry.id.to_string();
            let action = entry.action().to_string();
            let target = match &entry.mutation {
                Mutation::Create(snapshot) => format!("local {}", snapshot.local_id),
                Mutation::Update(snapshot) => match &snapshot.server_id {
                    Some(server_id) => format!("{server_id} (local {})", snapshot.local_id),
                    None => format!("local {}", snapshot.local_id),
                },
                Mutation::Delete(server_id) => server_id.to_string(),
            };
            let relative_time = format_relative_time(entry.created_at, now_ms);
            format!(
                "{id:<6}  {action:<7}  {:<20}  {target:<32}  {relative_time}",
                entry.collection
            )
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn describe_report(report: &SyncReport) -> String {
    let outcome = match report.outcome {
        SyncOutcome::Drained => "outbox drained",
        SyncOutcome::Halted => "halted on a remote error",
        SyncOutcome::Paused => "paused",
        SyncOutcome::Offline => "remote unreachable",
        SyncOutcome::AlreadyRunning => "another sync is running",
    };
    format!(
        "Sync {outcome}: {} sent, {} pending",
        report.processed, report.pending
    )
}
