//! Running certified requests: connector queries under a timeout, and
//! expression evaluation against a caller-supplied context.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::expr;
use super::policy::{self, PolicyVerdict};
use crate::connector::{Connector, QueryParams};
use crate::error::AgentError;
use crate::metrics::METRICS;
use crate::obs;

/// Outcome of one sandboxed execution.
///
/// Exactly one of `result` / `error` is populated, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: f64,
}

impl SandboxResult {
    pub fn ok(result: Value, execution_time_ms: f64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time_ms,
        }
    }

    pub fn failure(error: impl Into<String>, execution_time_ms: f64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time_ms,
        }
    }

    /// Failure built from the agent taxonomy; the message is the variant's text.
    pub fn from_error(err: &AgentError, execution_time_ms: f64) -> Self {
        Self::failure(err.to_string(), execution_time_ms)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Policy gate in front of every live data access.
#[derive(Debug, Clone)]
pub struct ExecutionSandbox {
    read_only: bool,
    timeout_secs: f64,
    timeout: Duration,
}

impl Default for ExecutionSandbox {
    fn default() -> Self {
        Self::new(true, 30.0)
    }
}

impl ExecutionSandbox {
    /// `timeout_secs` bounds each connector query. Negative or NaN values are
    /// treated as zero; values too large for a `Duration` mean "no limit".
    pub fn new(read_only: bool, timeout_secs: f64) -> Self {
        let timeout_secs = if timeout_secs.is_nan() {
            0.0
        } else {
            timeout_secs.max(0.0)
        };
        let timeout = Duration::try_from_secs_f64(timeout_secs).unwrap_or(Duration::MAX);
        Self {
            read_only,
            timeout_secs,
            timeout,
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn timeout_secs(&self) -> f64 {
        self.timeout_secs
    }

    pub fn validate_query(&self, query: &str) -> PolicyVerdict {
        policy::validate_query(query, self.read_only)
    }

    pub fn validate_expression(&self, expression: &str) -> PolicyVerdict {
        policy::validate_expression(expression)
    }

    /// Validate `query`, then run it on `connector` within the timeout.
    ///
    /// Never fails: rejections, timeouts and connector errors all come back
    /// as a failed [`SandboxResult`].
    pub async fn execute_query(
        &self,
        connector: &dyn Connector,
        query: &str,
        params: Option<&QueryParams>,
    ) -> SandboxResult {
        let start = Instant::now();

        if let PolicyVerdict::Denied { reason } = self.validate_query(query) {
            METRICS.inc_sandbox_rejections();
            obs::emit_sandbox_rejected("query", &reason);
            let err = AgentError::ValidationRejected { reason };
            return SandboxResult::from_error(&err, elapsed_ms(start));
        }

        let outcome = tokio::time::timeout(self.timeout, connector.query(query, params)).await;
        let elapsed = elapsed_ms(start);

        match outcome {
            Err(_elapsed) => {
                METRICS.inc_sandbox_timeouts();
                obs::emit_sandbox_timeout(self.timeout_secs);
                let err = AgentError::Timeout {
                    timeout_secs: self.timeout_secs,
                };
                SandboxResult::from_error(&err, elapsed)
            }
            Ok(result) if result.success => {
                tracing::debug!(source = %result.source, elapsed_ms = elapsed, "query executed");
                SandboxResult::ok(result.data.unwrap_or(Value::Null), elapsed)
            }
            Ok(result) => {
                let err = AgentError::ConnectorFailure {
                    message: result
                        .error
                        .unwrap_or_else(|| format!("{} query failed", result.source)),
                };
                SandboxResult::from_error(&err, elapsed)
            }
        }
    }

    /// Validate and evaluate `expression` with only `context` in scope.
    pub fn execute_expression(
        &self,
        expression: &str,
        context: Option<&Map<String, Value>>,
    ) -> SandboxResult {
        let start = Instant::now();

        let tree = match policy::check_expression(expression) {
            Ok(tree) => tree,
            Err(verdict) => {
                let reason = verdict.reason().unwrap_or_default().to_string();
                METRICS.inc_sandbox_rejections();
                obs::emit_sandbox_rejected("expression", &reason);
                let err = AgentError::ValidationRejected { reason };
                return SandboxResult::from_error(&err, elapsed_ms(start));
            }
        };

        let empty = Map::new();
        match expr::evaluate(&tree, context.unwrap_or(&empty)) {
            Ok(value) => SandboxResult::ok(value, elapsed_ms(start)),
            Err(e) => SandboxResult::failure(e.to_string(), elapsed_ms(start)),
        }
    }
}
