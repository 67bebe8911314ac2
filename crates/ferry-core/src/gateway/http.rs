//! REST client for the remote document API.

use reqwest::{Method, StatusCode};
use serde::Deserialize;

use super::{payload_server_id, RemoteError, RemoteGateway, RemoteResult};
use crate::config::GatewayConfig;
use crate::models::{Fields, RemoteDocument, ServerId};
use crate::util::{compact_text, is_http_url};

const CLIENT_ID_HEADER: &str = "x-client-id";

#[derive(Clone)]
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpGateway")
            .field("base_url", &self.config.base_url)
            .field("app_name", &self.config.app_name)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> RemoteResult<Self> {
        if !is_http_url(&config.base_url) {
            return Err(RemoteError::InvalidConfiguration(
                "base URL must include http:// or https://".to_string(),
            ));
        }
        if config.client_id.trim().is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "client id must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url,
            urlencoding::encode(&self.config.resolve_collection(collection))
        )
    }

    fn document_url(&self, collection: &str, server_id: &ServerId) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(server_id.as_str())
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Fields>,
    ) -> RemoteResult<reqwest::Response> {
        tracing::debug!("{method} {url}");
        let mut request = self
            .client
            .request(method, url)
            .header(CLIENT_ID_HEADER, &self.config.client_id)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }
        Ok(response)
    }
}

impl RemoteGateway for HttpGateway {
    async fn fetch_collection(&self, collection: &str) -> RemoteResult<Vec<RemoteDocument>> {
        let url = self.collection_url(collection);
        let response = self.send(Method::GET, &url, None).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            RemoteError::InvalidPayload(format!(
                "collection response is not a list of documents: {e}"
            ))
        })
    }

    async fn save_document(
        &self,
        collection: &str,
        payload: &Fields,
    ) -> RemoteResult<RemoteDocument> {
        let (method, url) = match payload_server_id(payload) {
            Some(server_id) => (Method::PUT, self.document_url(collection, &server_id)),
            None => (Method::POST, self.collection_url(collection)),
        };
        let response = self.send(method, &url, Some(payload)).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(RemoteDocument::default());
        }
        serde_json::from_str(&body).map_err(|e| {
            RemoteError::InvalidPayload(format!(
                "save response is not a document: {e} ({})",
                compact_text(&body)
            ))
        })
    }

    async fn delete_document(&self, collection: &str, server_id: &ServerId) -> RemoteResult<()> {
        let url = self.document_url(collection, server_id);
        self.send(Method::DELETE, &url, None).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(app_name: Option<&str>) -> HttpGateway {
        let mut config = GatewayConfig::new("https://api.example.com/", "client-1").unwrap();
        if let Some(app_name) = app_name {
            config = config.with_app_name(app_name);
        }
        HttpGateway::new(config).unwrap()
    }

    #[test]
    fn urls_use_prefixed_collection() {
        let gateway = gateway(Some("Mijn Projecten"));
        assert_eq!(
            gateway.collection_url("items"),
            "https://api.example.com/api/mijn_projecten_items"
        );
        assert_eq!(
            gateway.document_url("items", &ServerId::from("abc/1")),
            "https://api.example.com/api/mijn_projecten_items/abc%2F1"
        );
    }

    #[test]
    fn urls_without_app_name() {
        let gateway = gateway(None);
        assert_eq!(
            gateway.collection_url("Todo"),
            "https://api.example.com/api/todo"
        );
    }

    #[test]
    fn parse_api_error_prefers_error_field() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":" bad id "}"#),
            "bad id"
        );
        assert_eq!(
            parse_api_error(StatusCode::NOT_FOUND, r#"{"message":"missing"}"#),
            "missing"
        );
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "   "),
            "HTTP 503"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream failed"),
            "upstream failed"
        );
    }

    #[test]
    fn debug_hides_client_id() {
        let debug = format!("{:?}", gateway(None));
        assert!(!debug.contains("client-1"));
    }
}
