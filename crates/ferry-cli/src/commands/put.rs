use crate::commands::common::{build_document, flush_outbox, normalize_collection, Manager};
use crate::error::CliError;

pub async fn run_put(
    manager: &Manager,
    collection: &str,
    id: Option<&str>,
    json: Option<&str>,
    assignments: &[String],
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let document = build_document(id, json, assignments)?;

    let record = manager.save_document(&collection, document).await?;
    flush_outbox(manager).await?;

    let record = manager
        .store()
        .get_record(record.local_id)
        .await?
        .unwrap_or(record);
    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}
