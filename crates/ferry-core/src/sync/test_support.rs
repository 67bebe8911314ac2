use serde_json::Value;

use super::{EngineOptions, OfflineManager};
use crate::gateway::MemoryGateway;
use crate::models::{Document, Fields};
use crate::services::LocalStore;

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("test fixture must be an object"),
    }
}

pub fn document(value: Value) -> Document {
    Document::new(fields(value))
}

/// Manager over an in-memory store without background tasks.
pub async fn manager() -> OfflineManager<MemoryGateway> {
    manager_with(EngineOptions { auto_sync: false }).await
}

pub async fn manager_with(options: EngineOptions) -> OfflineManager<MemoryGateway> {
    let store = LocalStore::open_in_memory().await.unwrap();
    OfflineManager::with_options(store, MemoryGateway::new(), options)
}
