//! Tracing setup for liveagent binaries.
//!
//! [`init_tracing`] installs the global subscriber: an `EnvFilter` honouring
//! `RUST_LOG`, human-readable or JSON-lines output. Logs go to stderr so
//! stdout stays free for command output.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON instead of the pretty format.
/// * `level`: verbosity used when `RUST_LOG` is unset.
///
/// Only the first call in a process takes effect; later calls are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
