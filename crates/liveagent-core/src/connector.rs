//! Data-source capability.
//!
//! Any live source (database, REST endpoint) implements [`Connector`].
//! Connectors are registered by name with the [`crate::StateTracker`] and
//! only ever queried through the [`crate::ExecutionSandbox`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConnectorError;

/// Named query parameters passed through to a connector.
pub type QueryParams = Map<String, Value>;

/// Uniform result of a connector query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Name of the connector that produced this result.
    pub source: String,
}

impl QueryResult {
    pub fn ok(source: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    pub fn failure(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// Live data source.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish the connection. Must be called before `query`.
    async fn connect(&self) -> Result<(), ConnectorError>;

    /// Close the connection. No-op when not connected.
    async fn disconnect(&self);

    /// Execute a request and return live data.
    ///
    /// Failures are reported inside the [`QueryResult`], never as a panic.
    async fn query(&self, request: &str, params: Option<&QueryParams>) -> QueryResult;

    /// Check data before it is handed back to the agent.
    async fn validate(&self, data: &Value) -> bool;

    /// Whether the source is currently reachable.
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_and_failure_are_exclusive() {
        let ok = QueryResult::ok("rest_api", json!([1, 2]));
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.data, Some(json!([1, 2])));

        let failed = QueryResult::failure("rest_api", "HTTP 503: down");
        assert!(!failed.success);
        assert!(failed.data.is_none());
        assert_eq!(failed.error.as_deref(), Some("HTTP 503: down"));
        assert_eq!(failed.source, "rest_api");
    }
}
