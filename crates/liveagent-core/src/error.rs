//! Failure taxonomy for the query path.
//!
//! None of these escape [`crate::AgentBrain::process_query`]: each is caught
//! where it occurs and folded into a [`crate::SandboxResult`] or
//! [`crate::AgentResponse`]. The `Display` text of every variant is the exact
//! message a user eventually sees.

/// Errors produced while resolving and executing a tool call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Tool {tool_name} has no handler")]
    HandlerMissing { tool_name: String },

    /// The registered tool's own operation faulted.
    #[error("{message}")]
    HandlerFailure { message: String },

    /// Sandbox policy denied the request.
    #[error("{reason}")]
    ValidationRejected { reason: String },

    #[error("Query timed out after {timeout_secs:?}s")]
    Timeout { timeout_secs: f64 },

    /// The connector reported its own error.
    #[error("{message}")]
    ConnectorFailure { message: String },

    /// The model response had no recognizable tool call or malformed arguments.
    #[error("unparseable tool call: {reason}")]
    ParseFailure { reason: String },
}

/// Environment/config parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Transport-level failures of a model gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported provider: {provider}. Available: {available:?}")]
    UnsupportedProvider {
        provider: String,
        available: Vec<String>,
    },

    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

/// Connect-time failures of a data connector.
///
/// Query-time failures are not errors: they travel inside
/// [`crate::QueryResult`] so the sandbox can surface them verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("{connector} connection failed: {reason}")]
    Connection { connector: String, reason: String },
}
