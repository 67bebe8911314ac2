use crate::commands::common::{format_record_lines, normalize_collection, Manager};
use crate::error::CliError;

pub async fn run_list(
    manager: &Manager,
    collection: &str,
    refresh: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let collection = normalize_collection(collection)?;
    if refresh && manager.refresh_cache(&collection).await?.is_none() {
        eprintln!("Remote unavailable; showing cached records.");
    }

    let records = manager.get_collection(&collection).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records in {collection}.");
        return Ok(());
    }
    for line in format_record_lines(&records) {
        println!("{line}");
    }
    Ok(())
}
