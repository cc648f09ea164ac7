//! In-memory fakes for the connector and gateway traits (testing only)
//!
//! Provides `MemoryConnector` and `ScriptedGateway`, which satisfy the trait
//! contracts without a database or a model endpoint.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::connector::{Connector, QueryParams, QueryResult};
use crate::error::{ConnectorError, GatewayError};
use crate::gateway::{ModelGateway, ToolCall, ToolSchema};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

/// A query the connector received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub request: String,
    pub params: Option<QueryParams>,
}

#[derive(Debug, Default)]
struct Script {
    default_rows: Value,
    by_request: HashMap<String, Value>,
    failure: Option<String>,
    delay: Option<Duration>,
    received: Vec<RecordedQuery>,
}

/// Connector answering from scripted rows.
///
/// Requests with an exact-match script get those rows; everything else gets
/// the default rows (an empty array unless set).
#[derive(Debug)]
pub struct MemoryConnector {
    name: String,
    script: Mutex<Script>,
    connected: AtomicBool,
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryConnector {
    /// `name` is reported as the `source` of every result.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(Script {
                default_rows: json!([]),
                ..Script::default()
            }),
            connected: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_rows(self, rows: Value) -> Self {
        lock(&self.script).default_rows = rows;
        self
    }

    pub fn with_response(self, request: impl Into<String>, rows: Value) -> Self {
        lock(&self.script).by_request.insert(request.into(), rows);
        self
    }

    /// Sleep this long inside every query.
    pub fn with_delay(self, delay: Duration) -> Self {
        lock(&self.script).delay = Some(delay);
        self
    }

    /// Every subsequent query fails with `error`.
    pub fn fail_with(&self, error: impl Into<String>) {
        lock(&self.script).failure = Some(error.into());
    }

    pub fn clear_failure(&self) {
        lock(&self.script).failure = None;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of `query` calls that reached the connector.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<RecordedQuery> {
        lock(&self.script).received.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<(), ConnectorError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(ConnectorError::Connection {
                connector: self.name.clone(),
                reason: "unreachable".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn query(&self, request: &str, params: Option<&QueryParams>) -> QueryResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, outcome) = {
            let mut script = lock(&self.script);
            script.received.push(RecordedQuery {
                request: request.to_string(),
                params: params.cloned(),
            });
            let outcome = match &script.failure {
                Some(err) => Err(err.clone()),
                None => Ok(script
                    .by_request
                    .get(request)
                    .cloned()
                    .unwrap_or_else(|| script.default_rows.clone())),
            };
            (script.delay, outcome)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Ok(rows) if self.validate(&rows).await => QueryResult::ok(&self.name, rows),
            Ok(_) => QueryResult::failure(&self.name, "Data validation failed"),
            Err(err) => QueryResult::failure(&self.name, err),
        }
    }

    async fn validate(&self, data: &Value) -> bool {
        !data.is_null()
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ScriptedGateway
// ---------------------------------------------------------------------------

/// One `generate` call as the gateway saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub prompt: String,
    pub system_prompt: String,
    pub tools: Option<Vec<ToolSchema>>,
}

/// Gateway replaying a queue of canned responses.
///
/// Responses use the flat `message` shape; tool calls are read from
/// `message.tool_calls[0].function` with object arguments. An exhausted
/// queue is a transport error.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<Value, String>>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer.
    pub fn then_text(self, content: &str) -> Self {
        self.then_response(Self::text(content))
    }

    /// Queue a tool call.
    pub fn then_tool_call(self, name: &str, arguments: Value) -> Self {
        self.then_response(Self::tool_call(name, arguments))
    }

    pub fn then_response(self, response: Value) -> Self {
        lock(&self.responses).push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn then_error(self, message: &str) -> Self {
        lock(&self.responses).push_back(Err(message.to_string()));
        self
    }

    pub fn text(content: &str) -> Value {
        json!({"message": {"role": "assistant", "content": content}})
    }

    pub fn tool_call(name: &str, arguments: Value) -> Value {
        json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": name, "arguments": arguments}}]
            }
        })
    }

    /// Every `generate` call so far, oldest first.
    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        lock(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Option<&[ToolSchema]>,
    ) -> Result<Value, GatewayError> {
        lock(&self.prompts).push(RecordedPrompt {
            prompt: prompt.to_string(),
            system_prompt: system_prompt.to_string(),
            tools: tools.map(<[ToolSchema]>::to_vec),
        });
        match lock(&self.responses).pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(GatewayError::Http(message)),
            None => Err(GatewayError::NotConfigured(
                "scripted gateway has no responses left".to_string(),
            )),
        }
    }

    fn parse_tool_call(&self, response: &Value) -> Option<ToolCall> {
        let function = response.pointer("/message/tool_calls/0/function")?;
        let name = function.get("name")?.as_str()?;
        let arguments = match function.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Some(ToolCall::new(name, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_connector_scripted_rows() {
        let conn = MemoryConnector::new("pg")
            .with_rows(json!([{"sku": "A"}]))
            .with_response("special", json!([{"sku": "B"}]));
        conn.connect().await.unwrap();
        assert!(conn.is_connected());

        let r = conn.query("anything", None).await;
        assert!(r.success);
        assert_eq!(r.data, Some(json!([{"sku": "A"}])));
        assert_eq!(r.source, "pg");

        let r = conn.query("special", None).await;
        assert_eq!(r.data, Some(json!([{"sku": "B"}])));
        assert_eq!(conn.call_count(), 2);
        assert_eq!(conn.received()[1].request, "special");
    }

    #[tokio::test]
    async fn test_memory_connector_failure_injection() {
        let conn = MemoryConnector::default();
        conn.fail_with("db unreachable");
        let r = conn.query("x", None).await;
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("db unreachable"));

        conn.clear_failure();
        assert!(conn.query("x", None).await.success);

        conn.set_healthy(false);
        assert!(!conn.health_check().await);
        assert!(conn.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_connector_rejects_null_rows() {
        let conn = MemoryConnector::default().with_rows(Value::Null);
        let r = conn.query("x", None).await;
        assert_eq!(r.error.as_deref(), Some("Data validation failed"));
    }

    #[tokio::test]
    async fn test_scripted_gateway_replays_in_order() {
        let gw = ScriptedGateway::new()
            .then_tool_call("get_low_stock_items", json!({"threshold": 5}))
            .then_text("done")
            .then_error("connection reset");

        let first = gw.generate("q", "sys", None).await.unwrap();
        let call = gw.parse_tool_call(&first).unwrap();
        assert_eq!(call.name, "get_low_stock_items");
        assert_eq!(call.arguments.get("threshold"), Some(&json!(5)));

        let second = gw.generate("follow", "sys", None).await.unwrap();
        assert!(gw.parse_tool_call(&second).is_none());

        assert!(gw.generate("again", "sys", None).await.is_err());
        assert!(gw.generate("exhausted", "sys", None).await.is_err());
        assert_eq!(gw.prompts().len(), 4);
        assert_eq!(gw.remaining(), 0);
    }
}
