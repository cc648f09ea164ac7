//! Process-wide counters for the agent loop.
//!
//! Call sites bump counters silently; [`Metrics::flush`] reports all of them
//! in a single `info!` event (the CLI does this before exiting).

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    queries_processed: AtomicU64,
    tool_calls: AtomicU64,
    tool_failures: AtomicU64,
    sandbox_rejections: AtomicU64,
    sandbox_timeouts: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            queries_processed: AtomicU64::new(0),
            tool_calls: AtomicU64::new(0),
            tool_failures: AtomicU64::new(0),
            sandbox_rejections: AtomicU64::new(0),
            sandbox_timeouts: AtomicU64::new(0),
        }
    }

    pub fn inc_queries(&self) {
        self.queries_processed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "queries_processed", "counter incremented");
    }

    pub fn inc_tool_calls(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tool_calls", "counter incremented");
    }

    pub fn inc_tool_failures(&self) {
        self.tool_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tool_failures", "counter incremented");
    }

    pub fn inc_sandbox_rejections(&self) {
        self.sandbox_rejections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sandbox_rejections", "counter incremented");
    }

    pub fn inc_sandbox_timeouts(&self) {
        self.sandbox_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sandbox_timeouts", "counter incremented");
    }

    /// Emit all current values as one event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            queries_processed = self.queries_processed(),
            tool_calls = self.tool_calls(),
            tool_failures = self.tool_failures(),
            sandbox_rejections = self.sandbox_rejections(),
            sandbox_timeouts = self.sandbox_timeouts(),
        );
    }

    pub fn queries_processed(&self) -> u64 {
        self.queries_processed.load(Ordering::Relaxed)
    }

    pub fn tool_calls(&self) -> u64 {
        self.tool_calls.load(Ordering::Relaxed)
    }

    pub fn tool_failures(&self) -> u64 {
        self.tool_failures.load(Ordering::Relaxed)
    }

    pub fn sandbox_rejections(&self) -> u64 {
        self.sandbox_rejections.load(Ordering::Relaxed)
    }

    pub fn sandbox_timeouts(&self) -> u64 {
        self.sandbox_timeouts.load(Ordering::Relaxed)
    }

    /// Zero every counter (tests).
    pub fn reset(&self) {
        self.queries_processed.store(0, Ordering::Relaxed);
        self.tool_calls.store(0, Ordering::Relaxed);
        self.tool_failures.store(0, Ordering::Relaxed);
        self.sandbox_rejections.store(0, Ordering::Relaxed);
        self.sandbox_timeouts.store(0, Ordering::Relaxed);
    }
}
