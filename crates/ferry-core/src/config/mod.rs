//! Remote gateway configuration.
//!
//! Values come from the environment (`FERRY_*` variables) or are built
//! explicitly by the caller.

use std::env;
use std::time::Duration;

use crate::util::{is_http_url, normalize_text_option, snake_name};
use crate::{Error, Result};

const ENV_API_URL: &str = "FERRY_API_URL";
const ENV_CLIENT_ID: &str = "FERRY_CLIENT_ID";
const ENV_APP_NAME: &str = "FERRY_APP_NAME";
const ENV_HTTP_TIMEOUT_SECS: &str = "FERRY_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the remote authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// API base URL without trailing slash.
    pub base_url: String,
    /// Client identity sent with every request.
    pub client_id: String,
    /// Optional application prefix for collection names.
    pub app_name: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Build a configuration, validating the URL and client id.
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::Config(format!("{ENV_API_URL} must not be empty")))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(format!(
                "{ENV_API_URL} must include http:// or https://"
            )));
        }
        let client_id = normalize_text_option(Some(client_id.into()))
            .ok_or_else(|| Error::Config(format!("{ENV_CLIENT_ID} must not be empty")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            app_name: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }

    /// Prefix every collection with an application name.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = normalize_text_option(Some(app_name.into()));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Final collection name used on the wire: `{app}_{collection}`, snake-cased.
    #[must_use]
    pub fn resolve_collection(&self, collection: &str) -> String {
        match &self.app_name {
            Some(app) => format!("{}_{}", snake_name(app), snake_name(collection)),
            None => snake_name(collection),
        }
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<GatewayConfig>> {
    let base_url = normalize_text_option(lookup(ENV_API_URL));
    let client_id = normalize_text_option(lookup(ENV_CLIENT_ID));
    let app_name = normalize_text_option(lookup(ENV_APP_NAME));
    let timeout = normalize_text_option(lookup(ENV_HTTP_TIMEOUT_SECS));

    if base_url.is_none() && client_id.is_none() {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if base_url.is_none() {
        missing.push(ENV_API_URL);
    }
    if client_id.is_none() {
        missing.push(ENV_CLIENT_ID);
    }
    let (Some(base_url), Some(client_id)) = (base_url, client_id) else {
        return Err(Error::Config(format!(
            "gateway configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    let mut config = GatewayConfig::new(base_url, client_id)?;
    if let Some(app_name) = app_name {
        config = config.with_app_name(app_name);
    }
    if let Some(raw) = timeout {
        let secs = raw.parse::<u64>().map_err(|_| {
            Error::Config(format!("{ENV_HTTP_TIMEOUT_SECS} must be a whole number of seconds"))
        })?;
        config = config.with_timeout(Duration::from_secs(secs));
    }

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<GatewayConfig>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn parse_config_none_returns_none() {
        let map = HashMap::new();
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_requires_client_id() {
        let mut map = HashMap::new();
        map.insert(ENV_API_URL, "https://api.example.com");

        let err = parse_from_map(&map).unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains(ENV_CLIENT_ID)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_accepts_valid_values() {
        let mut map = HashMap::new();
        map.insert(ENV_API_URL, "http://10.0.0.2:5000/");
        map.insert(ENV_CLIENT_ID, "client-1");
        map.insert(ENV_APP_NAME, "Mijn Projecten");
        map.insert(ENV_HTTP_TIMEOUT_SECS, "3");

        let config = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.client_id, "client-1");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.resolve_collection("items"), "mijn_projecten_items");
    }

    #[test]
    fn parse_config_rejects_invalid_url_and_timeout() {
        let mut map = HashMap::new();
        map.insert(ENV_API_URL, "api.example.com");
        map.insert(ENV_CLIENT_ID, "client-1");
        assert!(parse_from_map(&map).is_err());

        map.insert(ENV_API_URL, "https://api.example.com");
        map.insert(ENV_HTTP_TIMEOUT_SECS, "soon");
        assert!(parse_from_map(&map).is_err());
    }

    #[test]
    fn resolve_collection_without_app_name() {
        let config = GatewayConfig::new("https://api.example.com", "c").unwrap();
        assert_eq!(config.resolve_collection("Todo Items"), "todo_items");
    }
}
