//! Concrete collaborators for `liveagent-core`.
//!
//! - [`RestApiConnector`]: `GET` requests against a JSON HTTP API
//! - `SurrealConnector` (feature `surreal`): SurrealQL against SurrealDB
//! - [`OpenAiGateway`] / [`OllamaGateway`]: chat-completion model backends,
//!   selected at runtime with [`create_gateway`]

pub mod connectors;
pub mod gateways;

pub use connectors::rest::{RestApiConfig, RestApiConnector};
#[cfg(feature = "surreal")]
pub use connectors::surreal::{SurrealConfig, SurrealConnector};
pub use gateways::ollama::OllamaGateway;
pub use gateways::openai::OpenAiGateway;
pub use gateways::{create_gateway, GatewayConfig, AVAILABLE_PROVIDERS};
