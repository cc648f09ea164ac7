//! Chat-completion model gateways and the provider factory.

pub mod ollama;
pub mod openai;

use std::sync::Arc;

use liveagent_core::{AgentError, GatewayError, ModelGateway, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use ollama::OllamaGateway;
pub use openai::OpenAiGateway;

/// Providers [`create_gateway`] understands.
pub const AVAILABLE_PROVIDERS: &[&str] = &["openai", "ollama"];

/// Provider selection and per-provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub provider: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub ollama_model: String,
    pub ollama_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: openai::DEFAULT_BASE_URL.to_string(),
            ollama_model: "llama3.2".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

impl GatewayConfig {
    /// `LLM_PROVIDER`, `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`,
    /// `OLLAMA_MODEL`, `OLLAMA_URL`; unset variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, default: String| std::env::var(key).unwrap_or(default);
        Self {
            provider: var("LLM_PROVIDER", defaults.provider),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: var("OPENAI_MODEL", defaults.openai_model),
            openai_base_url: var("OPENAI_BASE_URL", defaults.openai_base_url),
            ollama_model: var("OLLAMA_MODEL", defaults.ollama_model),
            ollama_url: var("OLLAMA_URL", defaults.ollama_url),
        }
    }
}

/// Build the gateway named by `config.provider`.
pub fn create_gateway(config: &GatewayConfig) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = match &config.openai_api_key {
                Some(key) => key.clone(),
                None => {
                    tracing::warn!("OPENAI_API_KEY not set; requests will be rejected");
                    String::new()
                }
            };
            let gateway = OpenAiGateway::new(api_key, config.openai_model.clone())?
                .with_base_url(config.openai_base_url.clone());
            Ok(Arc::new(gateway))
        }
        "ollama" => Ok(Arc::new(OllamaGateway::new(
            config.ollama_model.clone(),
            config.ollama_url.clone(),
        )?)),
        other => Err(GatewayError::UnsupportedProvider {
            provider: other.to_string(),
            available: AVAILABLE_PROVIDERS.iter().map(|p| p.to_string()).collect(),
        }),
    }
}

/// System (when non-empty) and user messages.
pub(crate) fn chat_messages(prompt: &str, system_prompt: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(2);
    if !system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": system_prompt}));
    }
    messages.push(json!({"role": "user", "content": prompt}));
    messages
}

/// Tool schemas in the `{"type": "function", "function": ...}` envelope.
pub(crate) fn function_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| json!({"type": "function", "function": t}))
        .collect()
}

/// Decode a `{name, arguments}` function object. Arguments may be an
/// object or a JSON-encoded object string.
pub(crate) fn decode_function_call(function: &Value) -> Result<ToolCall, AgentError> {
    let parse_failure = |reason: String| AgentError::ParseFailure { reason };

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| parse_failure("function name missing".to_string()))?;

    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
        Some(Value::String(raw)) => serde_json::from_str::<Map<String, Value>>(raw)
            .map_err(|e| parse_failure(format!("arguments for {name}: {e}")))?,
        Some(other) => {
            return Err(parse_failure(format!(
                "arguments for {name} must be an object, got {other}"
            )))
        }
    };

    Ok(ToolCall::new(name, arguments))
}

/// Shared `parse_tool_call` body: look up the function object at `pointer`
/// and decode it, logging malformed calls.
pub(crate) fn tool_call_at(response: &Value, pointer: &str) -> Option<ToolCall> {
    let function = response.pointer(pointer)?;
    match decode_function_call(function) {
        Ok(call) => Some(call),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed tool call");
            None
        }
    }
}

pub(crate) fn http_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Http(e.to_string())
}

/// Turn a response into JSON, mapping non-2xx statuses to [`GatewayError::Api`].
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Api {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await.map_err(http_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_lists_available() {
        let config = GatewayConfig {
            provider: "acme".to_string(),
            ..GatewayConfig::default()
        };
        match create_gateway(&config) {
            Err(GatewayError::UnsupportedProvider { provider, available }) => {
                assert_eq!(provider, "acme");
                assert_eq!(available, vec!["openai", "ollama"]);
            }
            Err(other) => panic!("expected UnsupportedProvider, got {other:?}"),
            Ok(_) => panic!("expected UnsupportedProvider, got a gateway"),
        }
    }

    #[test]
    fn test_known_providers_build() {
        for provider in AVAILABLE_PROVIDERS {
            let config = GatewayConfig {
                provider: provider.to_string(),
                openai_api_key: Some("sk-test".to_string()),
                ..GatewayConfig::default()
            };
            assert!(create_gateway(&config).is_ok(), "{provider}");
        }
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = GatewayConfig {
            openai_api_key: Some("sk-secret".to_string()),
            ..GatewayConfig::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn test_chat_messages_skip_empty_system() {
        assert_eq!(chat_messages("hi", "").len(), 1);
        let messages = chat_messages("hi", "be terse");
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "hi");
    }

    #[test]
    fn test_decode_function_call_variants() {
        let call = decode_function_call(&json!({
            "name": "get_low_stock_items",
            "arguments": "{\"threshold\": 3}"
        }))
        .unwrap();
        assert_eq!(call.arguments.get("threshold"), Some(&json!(3)));

        let call = decode_function_call(&json!({
            "name": "get_product_inventory",
            "arguments": {"product_id": "p-1"}
        }))
        .unwrap();
        assert_eq!(call.arguments.get("product_id"), Some(&json!("p-1")));

        let call = decode_function_call(&json!({"name": "ping", "arguments": ""})).unwrap();
        assert!(call.arguments.is_empty());

        let err = decode_function_call(&json!({"name": "x", "arguments": "{not json"}))
            .unwrap_err();
        assert!(matches!(err, AgentError::ParseFailure { .. }));
        assert!(decode_function_call(&json!({"arguments": {}})).is_err());
        assert!(decode_function_call(&json!({"name": "x", "arguments": [1]})).is_err());
    }
}
