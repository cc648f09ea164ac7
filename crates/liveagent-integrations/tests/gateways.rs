use std::sync::Arc;

use liveagent_core::fakes::MemoryConnector;
use liveagent_core::{
    register_inventory_tools, AgentBrain, Connector, ExecutionSandbox, GatewayError,
    ModelGateway, ResponseSource, StateTracker, ToolSchema,
};
use liveagent_integrations::{create_gateway, GatewayConfig, OllamaGateway, OpenAiGateway};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn low_stock_schema() -> ToolSchema {
    ToolSchema {
        name: "get_low_stock_items".to_string(),
        description: "Items at or below a quantity threshold".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {"threshold": {"type": "integer"}}
        }),
    }
}

fn openai_tool_call(name: &str, arguments: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            }
        }]
    })
}

fn openai_text(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

#[tokio::test]
async fn openai_sends_bearer_tools_and_auto_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "tool_choice": "auto",
            "tools": [{"type": "function", "function": {"name": "get_low_stock_items"}}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_tool_call("get_low_stock_items", "{\"threshold\": 3}")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = OpenAiGateway::new("sk-test", "gpt-4o")
        .unwrap()
        .with_base_url(server.uri());
    let tools = [low_stock_schema()];
    let response = gateway
        .generate("what is low?", "system", Some(&tools))
        .await
        .unwrap();

    let call = gateway.parse_tool_call(&response).unwrap();
    assert_eq!(call.name, "get_low_stock_items");
    assert_eq!(call.arguments.get("threshold"), Some(&json!(3)));
}

#[tokio::test]
async fn openai_non_success_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let gateway = OpenAiGateway::new("bad", "gpt-4o")
        .unwrap()
        .with_base_url(server.uri());
    match gateway.generate("hi", "", None).await {
        Err(GatewayError::Api { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn ollama_posts_non_streaming_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "function": {"name": "get_low_stock_items", "arguments": {"threshold": 2}}
                }]
            },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = OllamaGateway::new("llama3.2", server.uri()).unwrap();
    let tools = [low_stock_schema()];
    let response = gateway.generate("low?", "sys", Some(&tools)).await.unwrap();

    let call = gateway.parse_tool_call(&response).unwrap();
    assert_eq!(call.arguments.get("threshold"), Some(&json!(2)));
}

#[tokio::test]
async fn ollama_plain_answer_has_no_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "Hello"},
            "done": true
        })))
        .mount(&server)
        .await;

    let gateway = OllamaGateway::new("llama3.2", format!("{}/", server.uri())).unwrap();
    let response = gateway.generate("hi", "", None).await.unwrap();
    assert!(gateway.parse_tool_call(&response).is_none());
    assert_eq!(liveagent_core::extract_text(&response), "Hello");
}

#[tokio::test]
async fn agent_answers_from_live_data_through_openai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("tool_choice"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_tool_call("get_low_stock_items", "{\"threshold\": 5}")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("LIVE DATA"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_text("Bolt is low (live data).")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = GatewayConfig {
        openai_api_key: Some("sk-test".to_string()),
        openai_base_url: server.uri(),
        ..GatewayConfig::default()
    };
    let gateway = create_gateway(&config).unwrap();

    let connector = Arc::new(MemoryConnector::new("surrealdb").with_rows(json!([
        {"product_id": "p-2", "product_name": "Bolt", "quantity": 1}
    ])));
    connector.connect().await.unwrap();
    let state = Arc::new(StateTracker::new(60.0));
    state.register_connector("surrealdb", connector.clone());

    let mut agent = AgentBrain::new(gateway, state, Arc::new(ExecutionSandbox::default()));
    register_inventory_tools(&mut agent, "surrealdb");

    let response = agent.process_query("Which items are low on stock?").await;

    assert_eq!(response.source, ResponseSource::LiveData);
    assert_eq!(response.answer, "Bolt is low (live data).");
    assert_eq!(response.tool_used.as_deref(), Some("get_low_stock_items"));
    let raw = response.raw_data.unwrap();
    assert_eq!(raw["count"], json!(1));
    assert_eq!(
        connector.received()[0].params.as_ref().unwrap()["threshold"],
        json!(5)
    );
}
