use crate::commands::common::{format_outbox_lines, normalize_collection, Manager};
use crate::error::CliError;

pub async fn run_outbox(
    manager: &Manager,
    collection: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let collection = collection.map(normalize_collection).transpose()?;
    let entries = manager.store().list_outbox(collection.as_deref()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }
    for line in format_outbox_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
