use crate::commands::common::{describe_report, normalize_collection, Manager};
use crate::error::CliError;

pub async fn run_sync(manager: &Manager, as_json: bool) -> Result<(), CliError> {
    if !manager.gateway().is_configured() {
        return Err(CliError::RemoteNotConfigured);
    }

    let report = manager.sync_outbox().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", describe_report(&report));
    }
    Ok(())
}

pub async fn run_pull(manager: &Manager, collection: &str) -> Result<(), CliError> {
    if !manager.gateway().is_configured() {
        return Err(CliError::RemoteNotConfigured);
    }
    let collection = normalize_collection(collection)?;

    match manager.refresh_cache(&collection).await? {
        Some(stats) => println!(
            "Pulled {collection}: {} inserted, {} updated, {} removed, {} kept pending",
            stats.inserted,
            stats.updated,
            stats.removed,
            stats.protected + stats.suppressed
        ),
        None => println!("Remote unavailable; cache unchanged."),
    }
    Ok(())
}
