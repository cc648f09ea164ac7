//! Structured lifecycle events for the query path.
//!
//! Every query runs inside the `liveagent.query` span; the `emit_*` functions log one
//! `info!`/`warn!` event each with a stable `event` field so log pipelines can
//! filter on it.

use tracing::{info, warn};

/// RAII guard holding the `liveagent.query` span open for one query.
///
/// ```ignore
/// let _span = QuerySpan::enter(&query_id);
/// // everything logged here carries query_id
/// ```
pub struct QuerySpan {
    _span: tracing::span::EnteredSpan,
}

impl QuerySpan {
    pub fn enter(query_id: &str) -> Self {
        Self {
            _span: query_span(query_id).entered(),
        }
    }
}

/// The `liveagent.query` span itself, for instrumenting futures.
///
/// An entered guard must not be held across `.await`; async callers attach
/// this span with `tracing::Instrument` instead.
pub fn query_span(query_id: &str) -> tracing::Span {
    tracing::info_span!("liveagent.query", query_id = %query_id)
}

pub fn emit_query_started(query_id: &str, tool_count: usize) {
    info!(event = "query.started", query_id = %query_id, tool_count = tool_count);
}

/// The final answer was produced; `source` is the provenance tag.
pub fn emit_query_answered(query_id: &str, source: &str, tool_used: Option<&str>, duration_ms: u64) {
    info!(
        event = "query.answered",
        query_id = %query_id,
        source = %source,
        tool_used = tool_used.unwrap_or(""),
        duration_ms = duration_ms,
    );
}

pub fn emit_tool_executed(tool_name: &str, success: bool, error: Option<&str>) {
    if success {
        info!(event = "tool.executed", tool = %tool_name, success = true);
    } else {
        warn!(
            event = "tool.executed",
            tool = %tool_name,
            success = false,
            error = error.unwrap_or(""),
        );
    }
}

/// A request failed policy validation.
pub fn emit_sandbox_rejected(kind: &str, reason: &str) {
    warn!(event = "sandbox.rejected", kind = %kind, reason = %reason);
}

pub fn emit_sandbox_timeout(timeout_secs: f64) {
    warn!(event = "sandbox.timeout", timeout_secs = timeout_secs);
}
