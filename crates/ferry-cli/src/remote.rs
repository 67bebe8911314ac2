//! Remote selection for the CLI.

use ferry_core::gateway::RemoteResult;
use ferry_core::models::{Fields, RemoteDocument};
use ferry_core::{GatewayConfig, HttpGateway, MemoryGateway, RemoteError, RemoteGateway, ServerId};

use crate::error::CliError;

/// The remote authority a CLI invocation talks to.
pub enum CliGateway {
    Http(HttpGateway),
    Memory(MemoryGateway),
    /// No remote configured: the manager stays offline and writes queue up.
    Unconfigured,
}

impl CliGateway {
    /// Pick the gateway from flags and `FERRY_*` environment variables.
    pub fn resolve(memory_remote: bool) -> Result<Self, CliError> {
        if memory_remote {
            return Ok(Self::Memory(MemoryGateway::new()));
        }
        match GatewayConfig::from_env()? {
            Some(config) => Ok(Self::Http(HttpGateway::new(config)?)),
            None => Ok(Self::Unconfigured),
        }
    }

    pub const fn is_configured(&self) -> bool {
        !matches!(self, Self::Unconfigured)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Memory(_) => "memory",
            Self::Unconfigured => "none",
        }
    }
}

fn unconfigured() -> RemoteError {
    RemoteError::InvalidConfiguration("no remote configured".to_string())
}

impl RemoteGateway for CliGateway {
    async fn fetch_collection(&self, collection: &str) -> RemoteResult<Vec<RemoteDocument>> {
        match self {
            Self::Http(gateway) => gateway.fetch_collection(collection).await,
            Self::Memory(gateway) => gateway.fetch_collection(collection).await,
            Self::Unconfigured => Err(unconfigured()),
        }
    }

    async fn save_document(
        &self,
        collection: &str,
        payload: &Fields,
    ) -> RemoteResult<RemoteDocument> {
        match self {
            Self::Http(gateway) => gateway.save_document(collection, payload).await,
            Self::Memory(gateway) => gateway.save_document(collection, payload).await,
            Self::Unconfigured => Err(unconfigured()),
        }
    }

    async fn delete_document(&self, collection: &str, server_id: &ServerId) -> RemoteResult<()> {
        match self {
            Self::Http(gateway) => gateway.delete_document(collection, server_id).await,
            Self::Memory(gateway) => gateway.delete_document(collection, server_id).await,
            Self::Unconfigured => Err(unconfigured()),
        }
    }
}
