//! Ollama `/api/chat` gateway.

use std::time::Duration;

use async_trait::async_trait;
use liveagent_core::{GatewayError, ModelGateway, ToolCall, ToolSchema};
use serde_json::{json, Value};

use super::{chat_messages, function_tools, http_error, read_json, tool_call_at};

/// Local models can be slow to load.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OllamaGateway {
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OllamaGateway {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http_error)?;
        Ok(Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, system_prompt: &str, tools: Option<&[ToolSchema]>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": chat_messages(prompt, system_prompt),
            "stream": false,
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = Value::Array(function_tools(tools));
        }
        body
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Option<&[ToolSchema]>,
    ) -> Result<Value, GatewayError> {
        let body = self.request_body(prompt, system_prompt, tools);
        tracing::debug!(model = %self.model, tools = tools.map_or(0, <[_]>::len), "ollama request");

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        read_json(response).await
    }

    /// `message.tool_calls[0].function`, arguments already an object.
    fn parse_tool_call(&self, response: &Value) -> Option<ToolCall> {
        tool_call_at(response, "/message/tool_calls/0/function")
    }
}
