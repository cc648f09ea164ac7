//! Agent configuration, read from `LIVEAGENT_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sandbox::ExecutionSandbox;
use crate::state::StateTracker;

pub const ENV_READ_ONLY: &str = "LIVEAGENT_READ_ONLY";
pub const ENV_QUERY_TIMEOUT_SECS: &str = "LIVEAGENT_QUERY_TIMEOUT_SECS";
pub const ENV_STALE_THRESHOLD_SECS: &str = "LIVEAGENT_STALE_THRESHOLD_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Deny mutating keywords in queries.
    pub read_only: bool,
    /// Per-query connector timeout.
    pub query_timeout_secs: f64,
    /// Zero means every entity is always stale.
    pub stale_threshold_secs: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            read_only: true,
            query_timeout_secs: 30.0,
            stale_threshold_secs: 0.0,
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by whichever variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_READ_ONLY) {
            config.read_only = parse_bool(ENV_READ_ONLY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_QUERY_TIMEOUT_SECS) {
            config.query_timeout_secs = parse_secs(ENV_QUERY_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STALE_THRESHOLD_SECS) {
            config.stale_threshold_secs = parse_secs(ENV_STALE_THRESHOLD_SECS, &raw)?;
        }
        Ok(config)
    }

    pub fn sandbox(&self) -> ExecutionSandbox {
        ExecutionSandbox::new(self.read_only, self.query_timeout_secs)
    }

    pub fn state_tracker(&self) -> StateTracker {
        StateTracker::new(self.stale_threshold_secs)
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "expected true or false")),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<f64, ConfigError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(key, raw, "expected a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(key, raw, "must be a non-negative finite number"));
    }
    Ok(secs)
}
