//! HTTP bridge query provider.
//!
//! Talks to a gamedig-style query bridge: a sidecar service that speaks the
//! per-game wire protocols and exposes them as a single HTTP endpoint returning
//! JSON snapshots. `GET {base}/query?type=<game>&host=<host>&port=<port>`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::trace;

use crate::RawSnapshot;

use super::QueryProvider;

const QUERY_BRIDGE_URL: &str = "QUERY_BRIDGE_URL";

const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:8250";

/// Per-query timeout. Game query protocols answer in well under this; anything
/// slower is treated as offline for the cycle.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpBridgeProvider {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,
    base_url: String,
}

impl HttpBridgeProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(QUERY_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
        }
    }

    /// Build a provider pointed at `QUERY_BRIDGE_URL`, or the default local
    /// bridge address.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(QUERY_BRIDGE_URL).unwrap_or_else(|_| DEFAULT_BRIDGE_URL.to_string());
        Self::new(base_url)
    }
}

#[async_trait]
impl QueryProvider for HttpBridgeProvider {
    async fn query(&self, game_type: &str, host: &str, port: u16) -> Result<RawSnapshot> {
        let url = format!("{}/query", self.base_url);

        trace!("querying bridge for {game_type}@{host}:{port}");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("type", game_type),
                ("host", host),
                ("port", &port.to_string()),
            ])
            .send()
            .await
            .context("failed to reach query bridge")?;

        if !response.status().is_success() {
            anyhow::bail!("query bridge returned HTTP {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("failed to read bridge response body")?;

        let snapshot: RawSnapshot =
            serde_json::from_str(&body).context("failed to parse bridge snapshot JSON")?;

        trace!("bridge answered for {game_type}@{host}:{port}");

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_parses_snapshot() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("type", "cs2"))
            .and(query_param("host", "1.2.3.4"))
            .and(query_param("port", "27015"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Test Server",
                "map": "de_dust2",
                "ping": 45.5,
                "players": [{"name": "Ana", "score": "10"}],
                "maxplayers": "20",
                "raw": {"sv_hostname": "Test Server"}
            })))
            .mount(&mock_server)
            .await;

        let provider = HttpBridgeProvider::new(mock_server.uri());
        let snapshot = provider.query("cs2", "1.2.3.4", 27015).await.unwrap();

        assert_eq!(snapshot.map.as_deref(), Some("de_dust2"));
        assert_eq!(snapshot.players.len(), 1);
    }

    #[tokio::test]
    async fn test_query_http_error_is_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let provider = HttpBridgeProvider::new(mock_server.uri());
        let result = provider.query("cs2", "1.2.3.4", 27015).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_unreachable_bridge_is_failure() {
        // Nothing listens here.
        let provider = HttpBridgeProvider::new("http://127.0.0.1:1");
        let result = provider.query("cs2", "1.2.3.4", 27015).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_malformed_body_is_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let provider = HttpBridgeProvider::new(mock_server.uri());
        let result = provider.query("cs2", "1.2.3.4", 27015).await;

        assert!(result.is_err());
    }
}
