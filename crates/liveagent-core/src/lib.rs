//! liveagent core library
//!
//! An agent that answers questions about fast-changing entities only from
//! freshly fetched, validated live data:
//!
//! - [`AgentBrain`]: two-phase model protocol with tool dispatch and provenance
//! - [`ExecutionSandbox`]: certifies queries/expressions and bounds run time
//! - [`StateTracker`]: per-entity staleness and the named connector registry
//!
//! Model backends and data sources plug in through [`ModelGateway`] and
//! [`Connector`].

pub mod agent;
pub mod config;
pub mod connector;
pub mod error;
pub mod fakes;
pub mod gateway;
pub mod metrics;
pub mod obs;
pub mod sandbox;
pub mod state;
pub mod telemetry;

pub use agent::{
    handler_fn, register_inventory_tools, AgentBrain, AgentResponse, ResponseSource,
    ToolDefinition, ToolHandler,
};
pub use config::AgentConfig;
pub use connector::{Connector, QueryParams, QueryResult};
pub use error::{AgentError, ConfigError, ConnectorError, GatewayError};
pub use gateway::{extract_text, ModelGateway, ToolCall, ToolSchema};
pub use metrics::METRICS;
pub use sandbox::{ExecutionSandbox, PolicyVerdict, SandboxResult};
pub use state::{EntityState, StateTracker};
pub use telemetry::init_tracing;
