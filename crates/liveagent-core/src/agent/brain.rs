//! The decision/execution loop.
//!
//! Phase 1 asks the model, with the tool schemas attached, whether it needs
//! live data. If it names a tool, the tool runs and phase 2 asks the model to
//! answer from the tool's result alone. Every answer carries a provenance tag.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::prompts::{follow_up_prompt, SYSTEM_PROMPT};
use super::tools::ToolDefinition;
use crate::error::AgentError;
use crate::gateway::{extract_text, ModelGateway, ToolCall, ToolSchema};
use crate::metrics::METRICS;
use crate::obs;
use crate::sandbox::{ExecutionSandbox, SandboxResult};
use crate::state::StateTracker;

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// A tool ran successfully and the answer is grounded in its result.
    LiveData,
    /// A tool was called and failed; the answer reports the failure.
    ToolExecution,
    /// No tool was invoked.
    LlmOnly,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::LiveData => "live_data",
            ResponseSource::ToolExecution => "tool_execution",
            ResponseSource::LlmOnly => "llm_only",
        }
    }
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final answer with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub source: ResponseSource,
    pub data_timestamp: Option<String>,
    pub tool_used: Option<String>,
    /// Raw tool result; only set for [`ResponseSource::LiveData`].
    pub raw_data: Option<Value>,
}

impl AgentResponse {
    pub fn llm_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            source: ResponseSource::LlmOnly,
            data_timestamp: None,
            tool_used: None,
            raw_data: None,
        }
    }

    pub fn tool_failure(tool_name: impl Into<String>, error: &str) -> Self {
        Self {
            answer: format!("Error fetching live data: {error}"),
            source: ResponseSource::ToolExecution,
            data_timestamp: None,
            tool_used: Some(tool_name.into()),
            raw_data: None,
        }
    }

    pub fn live_data(
        answer: impl Into<String>,
        data_timestamp: Option<String>,
        tool_name: impl Into<String>,
        raw_data: Value,
    ) -> Self {
        Self {
            answer: answer.into(),
            source: ResponseSource::LiveData,
            data_timestamp,
            tool_used: Some(tool_name.into()),
            raw_data: Some(raw_data),
        }
    }
}

/// `timestamp` field of an object result: strings verbatim, other values
/// rendered as JSON.
fn data_timestamp(data: &Value) -> Option<String> {
    match data.get("timestamp")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Orchestrates model calls, tool execution and provenance.
pub struct AgentBrain {
    gateway: Arc<dyn ModelGateway>,
    state: Arc<StateTracker>,
    sandbox: Arc<ExecutionSandbox>,
    tools: HashMap<String, ToolDefinition>,
}

impl AgentBrain {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        state: Arc<StateTracker>,
        sandbox: Arc<ExecutionSandbox>,
    ) -> Self {
        Self {
            gateway,
            state,
            sandbox,
            tools: HashMap::new(),
        }
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register_tool(&mut self, tool: ToolDefinition) {
        if self.tools.contains_key(&tool.name) {
            tracing::debug!(tool = %tool.name, "replacing registered tool");
        }
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn state(&self) -> &Arc<StateTracker> {
        &self.state
    }

    pub fn sandbox(&self) -> &Arc<ExecutionSandbox> {
        &self.sandbox
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas offered to the model, sorted by name.
    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(ToolDefinition::schema).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Answer a user query. Never fails: every fault becomes an answer.
    pub async fn process_query(&self, user_query: &str) -> AgentResponse {
        let query_id = Uuid::new_v4().to_string();
        let span = obs::query_span(&query_id);
        self.run_query(&query_id, user_query).instrument(span).await
    }

    async fn run_query(&self, query_id: &str, user_query: &str) -> AgentResponse {
        let started = Instant::now();
        METRICS.inc_queries();

        let schemas = self.tool_schemas();
        obs::emit_query_started(query_id, schemas.len());
        let offered = (!schemas.is_empty()).then_some(schemas.as_slice());

        let response = match self
            .gateway
            .generate(user_query, SYSTEM_PROMPT, offered)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "model call failed");
                let answer = AgentResponse::llm_only(format!("Error generating response: {e}"));
                return finish(query_id, started, answer);
            }
        };

        let Some(call) = self.gateway.parse_tool_call(&response) else {
            return finish(query_id, started, AgentResponse::llm_only(extract_text(&response)));
        };

        let tool_name = call.name.clone();
        let result = self.execute_tool(call).await;
        if !result.success {
            let error = result.error.unwrap_or_default();
            return finish(query_id, started, AgentResponse::tool_failure(tool_name, &error));
        }

        let data = result.result.unwrap_or(Value::Null);
        let timestamp = data_timestamp(&data);
        let prompt = follow_up_prompt(user_query, &tool_name, timestamp.as_deref(), &data);

        let answer = match self.gateway.generate(&prompt, SYSTEM_PROMPT, None).await {
            Ok(response) => extract_text(&response),
            Err(e) => {
                tracing::warn!(error = %e, tool = %tool_name, "follow-up model call failed");
                format!("Live data was fetched but the model failed to answer: {e}")
            }
        };

        finish(
            query_id,
            started,
            AgentResponse::live_data(answer, timestamp, tool_name, data),
        )
    }

    /// Resolve and run one tool call.
    async fn execute_tool(&self, call: ToolCall) -> SandboxResult {
        let started = Instant::now();
        METRICS.inc_tool_calls();

        let outcome = match self.tools.get(&call.name) {
            None => Err(AgentError::UnknownTool {
                tool_name: call.name.clone(),
            }),
            Some(ToolDefinition { handler: None, .. }) => Err(AgentError::HandlerMissing {
                tool_name: call.name.clone(),
            }),
            Some(ToolDefinition {
                handler: Some(handler),
                ..
            }) => handler
                .call(call.arguments)
                .await
                .map_err(|e| AgentError::HandlerFailure {
                    message: format!("{e:#}"),
                }),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(value) => {
                obs::emit_tool_executed(&call.name, true, None);
                SandboxResult::ok(value, elapsed_ms)
            }
            Err(err) => {
                METRICS.inc_tool_failures();
                let result = SandboxResult::from_error(&err, elapsed_ms);
                obs::emit_tool_executed(&call.name, false, result.error.as_deref());
                result
            }
        }
    }
}

fn finish(query_id: &str, started: Instant, response: AgentResponse) -> AgentResponse {
    obs::emit_query_answered(
        query_id,
        response.source.as_str(),
        response.tool_used.as_deref(),
        started.elapsed().as_millis() as u64,
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ResponseSource::LiveData).unwrap(),
            json!("live_data")
        );
        assert_eq!(ResponseSource::ToolExecution.to_string(), "tool_execution");
        assert_eq!(ResponseSource::LlmOnly.as_str(), "llm_only");
    }

    #[test]
    fn test_data_timestamp_extraction() {
        assert_eq!(
            data_timestamp(&json!({"timestamp": "2024-05-01T10:00:00Z"})).as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert_eq!(
            data_timestamp(&json!({"timestamp": 12.5})).as_deref(),
            Some("12.5")
        );
        assert_eq!(data_timestamp(&json!({"timestamp": null})), None);
        assert_eq!(data_timestamp(&json!({"rows": []})), None);
        assert_eq!(data_timestamp(&json!([{"timestamp": "x"}])), None);
    }

    #[test]
    fn test_tool_failure_shape() {
        let r = AgentResponse::tool_failure("get_orders", "db unreachable");
        assert_eq!(r.answer, "Error fetching live data: db unreachable");
        assert_eq!(r.source, ResponseSource::ToolExecution);
        assert_eq!(r.tool_used.as_deref(), Some("get_orders"));
        assert!(r.raw_data.is_none());
    }
}
