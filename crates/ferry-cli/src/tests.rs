use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ferry_core::models::Mutation;
use ferry_core::{Identity, LocalId, ServerId, SyncOutcome, SyncReport};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::CompletionShell;
use crate::commands::common::{
    build_document, describe_report, fields_preview, format_outbox_lines, format_record_lines,
    format_relative_time, normalize_collection, normalize_record_id, open_manager,
    parse_assignment, parse_identity,
};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::put::run_put;
use crate::commands::sync::{run_pull, run_sync};
use crate::error::CliError;
use crate::remote::CliGateway;

#[test]
fn parse_assignment_reads_json_values() {
    assert_eq!(
        parse_assignment("done=true").unwrap(),
        ("done".to_string(), json!(true))
    );
    assert_eq!(
        parse_assignment("count = 3").unwrap(),
        ("count".to_string(), json!(3))
    );
    assert_eq!(
        parse_assignment("title=Buy milk").unwrap(),
        ("title".to_string(), json!("Buy milk"))
    );
    assert_eq!(
        parse_assignment("note=a=b").unwrap(),
        ("note".to_string(), json!("a=b"))
    );
}

#[test]
fn parse_assignment_rejects_missing_key_or_separator() {
    assert!(matches!(
        parse_assignment("title"),
        Err(CliError::InvalidAssignment(_))
    ));
    assert!(matches!(
        parse_assignment("=value"),
        Err(CliError::InvalidAssignment(_))
    ));
}

#[test]
fn parse_identity_distinguishes_local_and_server_ids() {
    assert_eq!(parse_identity("12"), Identity::Local(LocalId::new(12)));
    assert_eq!(
        parse_identity("65f0c2a1"),
        Identity::Remote(ServerId::from("65f0c2a1"))
    );
}

#[test]
fn build_document_merges_json_and_assignments() {
    let document = build_document(
        Some("S1"),
        Some(r#"{"title":"A","tags":["x"]}"#),
        &["title=B".to_string()],
    )
    .unwrap();

    assert_eq!(document.identity, Some(Identity::Remote(ServerId::from("S1"))));
    assert_eq!(document.fields.get("title"), Some(&json!("B")));
    assert_eq!(document.fields.get("tags"), Some(&json!(["x"])));
}

#[test]
fn build_document_lifts_identity_from_json() {
    let document = build_document(None, Some(r#"{"_id":"S2","title":"A"}"#), &[]).unwrap();

    assert_eq!(document.identity, Some(Identity::Remote(ServerId::from("S2"))));
    assert!(!document.fields.contains_key("_id"));
}

#[test]
fn build_document_rejects_empty_and_non_objects() {
    assert!(matches!(
        build_document(None, None, &[]),
        Err(CliError::EmptyDocument)
    ));
    assert!(matches!(
        build_document(None, Some("[1,2]"), &[]),
        Err(CliError::NotAnObject)
    ));
}

#[test]
fn normalizers_reject_empty_values() {
    assert!(matches!(
        normalize_collection("  "),
        Err(CliError::EmptyCollection)
    ));
    assert!(matches!(normalize_record_id(""), Err(CliError::EmptyRecordId)));
    assert_eq!(normalize_collection(" items ").unwrap(), "items");
}

#[test]
fn fields_preview_truncates_with_ellipsis() {
    let document = build_document(
        None,
        None,
        &["title=This is a very long sentence that should be shortened".to_string()],
    )
    .unwrap();
    let preview = fields_preview(&document.fields, 20);
    assert_eq!(preview.chars().count(), 20);
    assert!(preview.ends_with("..."));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn describe_report_mentions_counts() {
    let report = SyncReport {
        outcome: SyncOutcome::Halted,
        processed: 1,
        pending: 2,
    };
    assert_eq!(
        describe_report(&report),
        "Sync halted on a remote error: 1 sent, 2 pending"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn put_offline_queues_and_lists_unsynced_record() {
    let db_path = unique_test_db_path();
    let manager = open_manager(&db_path, CliGateway::Unconfigured, false)
        .await
        .unwrap();
    assert!(!manager.is_online());

    run_put(&manager, "items", None, None, &["title=A".to_string()])
        .await
        .unwrap();

    let records = manager.store().list_records("items").await.unwrap();
    assert_eq!(records.len(), 1);
    let lines = format_record_lines(&records);
    assert!(lines[0].contains("(unsynced)"));
    assert!(lines[0].contains("\"title\":\"A\""));

    let outbox = manager.store().list_outbox(None).await.unwrap();
    let lines = format_outbox_lines(&outbox);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("create"));
    assert!(lines[0].contains("local 1"));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn put_with_memory_remote_syncs_before_returning() {
    let db_path = unique_test_db_path();
    let manager = open_manager(&db_path, CliGateway::Memory(Default::default()), false)
        .await
        .unwrap();

    run_put(&manager, "items", None, None, &["title=A".to_string()])
        .await
        .unwrap();

    let records = manager.store().list_records("items").await.unwrap();
    assert!(records[0].is_synced());
    assert_eq!(manager.store().pending_count().await.unwrap(), 0);

    run_pull(&manager, "items").await.unwrap();
    assert_eq!(manager.store().list_records("items").await.unwrap().len(), 1);

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_while_offline_queues_remote_delete() {
    let db_path = unique_test_db_path();
    let manager = open_manager(&db_path, CliGateway::Memory(Default::default()), true)
        .await
        .unwrap();

    run_put(&manager, "items", Some("S1"), None, &["title=B".to_string()])
        .await
        .unwrap();
    run_delete(&manager, "items", "S1").await.unwrap();

    assert!(manager.store().list_records("items").await.unwrap().is_empty());
    let outbox = manager.store().list_outbox(None).await.unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].mutation, Mutation::Delete(ServerId::from("S1")));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sync_requires_remote_configuration() {
    let db_path = unique_test_db_path();
    let manager = open_manager(&db_path, CliGateway::Unconfigured, false)
        .await
        .unwrap();

    let result = run_sync(&manager, false).await;
    assert!(matches!(result, Err(CliError::RemoteNotConfigured)));

    cleanup_db_files(&db_path);
}

#[test]
fn run_completions_writes_bash_script_file() {
    let output_path = std::env::temp_dir().join(format!(
        "ferry-completions-test-{}.bash",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos())
    ));

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_ferry()"));
    assert!(script.contains("complete -F _ferry"));

    let _ = std::fs::remove_file(output_path);
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("ferry-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &Path) {
    // On Windows, libsql can keep file handles alive briefly after drop.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(sidecar));
    }
}
