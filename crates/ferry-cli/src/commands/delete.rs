use crate::commands::common::{flush_outbox, normalize_collection, normalize_record_id, Manager};
use crate::error::CliError;

pub async fn run_delete(manager: &Manager, collection: &str, id: &str) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    let id = normalize_record_id(id)?;

    manager.delete_document(&collection, &id).await?;
    flush_outbox(manager).await?;

    println!("{id}");
    Ok(())
}
