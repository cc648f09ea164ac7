//! Model-gateway capability.
//!
//! Abstracts over the wire formats of language-model backends. The core only
//! ever sees the raw JSON response and asks the gateway to pull a tool call
//! out of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Tool description handed to the model (`{name, description, parameters}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing accepted arguments.
    pub parameters: Value,
}

/// A structured tool request emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Language-model backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one completion. `tools` is `None` when no tools are on offer.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Option<&[ToolSchema]>,
    ) -> Result<Value, GatewayError>;

    /// Extract the first tool call from a raw response, if any.
    ///
    /// Malformed tool calls yield `None`: the agent then answers directly.
    fn parse_tool_call(&self, response: &Value) -> Option<ToolCall>;
}

/// Pull the assistant text out of a raw model response.
///
/// Understands the nested `choices[0].message.content` shape and the flat
/// `message.content` shape; anything else is rendered as JSON.
pub fn extract_text(response: &Value) -> String {
    if let Some(content) = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return content.to_string();
    }
    if let Some(content) = response
        .pointer("/message/content")
        .and_then(Value::as_str)
    {
        return content.to_string();
    }
    match response {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
