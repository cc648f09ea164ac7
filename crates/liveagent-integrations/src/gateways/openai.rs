//! OpenAI-compatible chat-completions gateway.

use std::time::Duration;

use async_trait::async_trait;
use liveagent_core::{GatewayError, ModelGateway, ToolCall, ToolSchema};
use serde_json::{json, Value};

use super::{chat_messages, function_tools, http_error, read_json, tool_call_at};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiGateway {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http_error)?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    /// Point at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str, system_prompt: &str, tools: Option<&[ToolSchema]>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": chat_messages(prompt, system_prompt),
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = Value::Array(function_tools(tools));
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Option<&[ToolSchema]>,
    ) -> Result<Value, GatewayError> {
        let body = self.request_body(prompt, system_prompt, tools);
        tracing::debug!(model = %self.model, tools = tools.map_or(0, <[_]>::len), "openai request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;
        read_json(response).await
    }

    /// `choices[0].message.tool_calls[0].function`, arguments JSON-encoded.
    fn parse_tool_call(&self, response: &Value) -> Option<ToolCall> {
        tool_call_at(response, "/choices/0/message/tool_calls/0/function")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> OpenAiGateway {
        OpenAiGateway::new("sk-test", "gpt-4o").unwrap()
    }

    #[test]
    fn test_request_body_with_tools() {
        let tools = vec![ToolSchema {
            name: "get_low_stock_items".into(),
            description: "Low stock".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = gateway().request_body("q", "sys", Some(&tools));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_low_stock_items");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_request_body_without_tools() {
        let body = gateway().request_body("q", "", None);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_tool_call() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_product_inventory",
                            "arguments": "{\"product_name\": \"widget\"}"
                        }
                    }]
                }
            }]
        });
        let call = gateway().parse_tool_call(&response).unwrap();
        assert_eq!(call.name, "get_product_inventory");
        assert_eq!(call.arguments.get("product_name"), Some(&json!("widget")));
    }

    #[test]
    fn test_parse_tool_call_absent_or_malformed() {
        let gw = gateway();
        assert!(gw
            .parse_tool_call(&json!({"choices": [{"message": {"content": "hi"}}]}))
            .is_none());
        assert!(gw.parse_tool_call(&json!({"choices": []})).is_none());
        let bad = json!({"choices": [{"message": {"tool_calls": [
            {"function": {"name": "x", "arguments": "{oops"}}
        ]}}]});
        assert!(gw.parse_tool_call(&bad).is_none());
    }
}
