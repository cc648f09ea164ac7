//! JSON-over-HTTP connector. The query string is the endpoint path and the
//! params become query-string pairs.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use liveagent_core::{Connector, ConnectorError, QueryParams, QueryResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::REST_API_SOURCE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiConfig {
    /// Trailing slashes are ignored.
    pub base_url: String,
    /// Sent with every request.
    pub headers: BTreeMap<String, String>,
    pub timeout_secs: f64,
}

impl RestApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
            timeout_secs: 30.0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: f64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// `REST_API_URL` (required, else `None`), `REST_API_TOKEN` (bearer,
    /// optional) and `REST_API_TIMEOUT_SECS` (default 30).
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("REST_API_URL").ok()?;
        let mut config = Self::new(base_url);
        if let Ok(token) = std::env::var("REST_API_TOKEN") {
            config = config.with_header(AUTHORIZATION.as_str(), format!("Bearer {token}"));
        }
        if let Some(secs) = std::env::var("REST_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            config.timeout_secs = secs;
        }
        Some(config)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

pub struct RestApiConnector {
    config: RestApiConfig,
    client: Mutex<Option<reqwest::Client>>,
}

impl RestApiConnector {
    pub fn new(config: RestApiConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RestApiConfig {
        &self.config
    }

    /// Cheap clone of the connected client, if any.
    fn client(&self) -> Option<reqwest::Client> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn build_client(&self) -> Result<reqwest::Client, String> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| format!("invalid value for header {name}: {e}"))?;
            headers.insert(name, value);
        }
        let timeout = Duration::try_from_secs_f64(self.config.timeout_secs)
            .map_err(|e| format!("invalid timeout {}: {e}", self.config.timeout_secs))?;

        reqwest::Client::builder()
            .user_agent(concat!("liveagent/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())
    }
}

/// Query-string rendering: strings bare, everything else as JSON.
fn query_pairs(params: &QueryParams) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}

#[async_trait]
impl Connector for RestApiConnector {
    async fn connect(&self) -> Result<(), ConnectorError> {
        let client = self
            .build_client()
            .map_err(|reason| ConnectorError::Connection {
                connector: REST_API_SOURCE.to_string(),
                reason,
            })?;
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
        tracing::info!(base_url = %self.config.base_url, "REST API connector ready");
        Ok(())
    }

    async fn disconnect(&self) {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn query(&self, request: &str, params: Option<&QueryParams>) -> QueryResult {
        let Some(client) = self.client() else {
            return QueryResult::failure(REST_API_SOURCE, "Not connected to API");
        };

        let mut builder = client.get(self.config.url(request));
        if let Some(params) = params {
            builder = builder.query(&query_pairs(params));
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return QueryResult::failure(REST_API_SOURCE, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return QueryResult::failure(
                REST_API_SOURCE,
                format!("HTTP {}: {body}", status.as_u16()),
            );
        }

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => return QueryResult::failure(REST_API_SOURCE, e.to_string()),
        };
        if !self.validate(&data).await {
            return QueryResult::failure(REST_API_SOURCE, "Data validation failed");
        }
        QueryResult::ok(REST_API_SOURCE, data)
    }

    async fn validate(&self, data: &Value) -> bool {
        !data.is_null()
    }

    async fn health_check(&self) -> bool {
        let Some(client) = self.client() else {
            return false;
        };
        match client.get(self.config.url("/health")).send().await {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                tracing::debug!(error = %e, "REST API health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joining() {
        let config = RestApiConfig::new("http://api.local/v1/");
        assert_eq!(config.base_url, "http://api.local/v1");
        assert_eq!(config.url("/orders"), "http://api.local/v1/orders");
        assert_eq!(config.url("orders"), "http://api.local/v1/orders");
    }

    #[test]
    fn test_query_pairs_rendering() {
        let params: QueryParams =
            serde_json::from_value(json!({"status": "open", "limit": 5, "all": true})).unwrap();
        let mut pairs = query_pairs(&params);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("all".to_string(), "true".to_string()),
                ("limit".to_string(), "5".to_string()),
                ("status".to_string(), "open".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_header_fails_connect() {
        let conn = RestApiConnector::new(
            RestApiConfig::new("http://api.local").with_header("bad header", "x"),
        );
        let err = conn.connect().await.unwrap_err();
        assert!(err.to_string().contains("invalid header name"));
    }

    #[tokio::test]
    async fn test_query_before_connect() {
        let conn = RestApiConnector::new(RestApiConfig::new("http://api.local"));
        let r = conn.query("/orders", None).await;
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("Not connected to API"));
        assert_eq!(r.source, "rest_api");
        assert!(!conn.health_check().await);
    }
}
