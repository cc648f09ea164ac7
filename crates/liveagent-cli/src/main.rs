//! liveagent - ask questions that are answered from live data
//!
//! ## Commands
//!
//! - `query`: run one question through the agent and print the response
//! - `health`: probe every configured connector
//! - `check-query`: show the sandbox verdict for a data query
//! - `eval`: evaluate an expression in the restricted sandbox
//! - `tools`: list the tool schemas offered to the model

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use liveagent_core::obs::QuerySpan;
use liveagent_core::{
    register_inventory_tools, AgentBrain, AgentConfig, Connector, ExecutionSandbox,
    StateTracker, METRICS,
};
use liveagent_integrations::connectors::{REST_API_SOURCE, SURREALDB_SOURCE};
use liveagent_integrations::{create_gateway, GatewayConfig, RestApiConfig, RestApiConnector};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "liveagent")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI agent that answers from live data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Allow mutating keywords in data queries (overrides LIVEAGENT_READ_ONLY)
    #[arg(long, global = true)]
    allow_writes: bool,

    /// Per-query timeout in seconds (overrides LIVEAGENT_QUERY_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question, fetching live data through the registered tools
    Query {
        /// The question to ask
        text: String,
    },

    /// Check the health of every configured connector
    Health,

    /// Show whether the sandbox would accept a data query
    CheckQuery {
        /// Query text to validate
        query: String,
    },

    /// Evaluate an expression in the restricted sandbox
    Eval {
        /// Expression to evaluate
        expression: String,

        /// JSON object whose keys are the only names in scope
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Print the tool schemas offered to the model
    Tools,
}

#[derive(Debug, Serialize)]
struct HealthOutput {
    status: &'static str,
    connectors: BTreeMap<String, bool>,
}

impl HealthOutput {
    fn new(connectors: BTreeMap<String, bool>) -> Self {
        let status = if connectors.values().all(|healthy| *healthy) {
            "healthy"
        } else {
            "degraded"
        };
        Self { status, connectors }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    liveagent_core::init_tracing(cli.json, level);

    let mut config = AgentConfig::from_env().context("Invalid agent configuration")?;
    if cli.allow_writes {
        config.read_only = false;
    }
    if let Some(secs) = cli.timeout_secs {
        if !secs.is_finite() || secs < 0.0 {
            bail!("--timeout-secs must be a non-negative number, got {secs}");
        }
        config.query_timeout_secs = secs;
    }

    match cli.command {
        Commands::Query { text } => cmd_query(&config, &text).await,
        Commands::Health => cmd_health(&config).await,
        Commands::CheckQuery { query } => cmd_check_query(&config.sandbox(), &query),
        Commands::Eval {
            expression,
            context,
        } => cmd_eval(&config.sandbox(), &expression, context.as_deref()),
        Commands::Tools => cmd_tools(&config),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Connectors configured in the environment. REST needs `REST_API_URL`;
/// SurrealDB is always offered when the feature is enabled.
fn configured_connectors() -> Vec<(&'static str, Arc<dyn Connector>)> {
    let mut connectors: Vec<(&'static str, Arc<dyn Connector>)> = Vec::new();
    if let Some(rest) = RestApiConfig::from_env() {
        let rest: Arc<dyn Connector> = Arc::new(RestApiConnector::new(rest));
        connectors.push((REST_API_SOURCE, rest));
    }
    #[cfg(feature = "surreal")]
    {
        use liveagent_integrations::{SurrealConfig, SurrealConnector};
        let surreal: Arc<dyn Connector> =
            Arc::new(SurrealConnector::new(SurrealConfig::from_env()));
        connectors.push((SURREALDB_SOURCE, surreal));
    }
    connectors
}

/// Connect each candidate and register only the ones that come up.
async fn connect_all(
    state: &StateTracker,
    candidates: Vec<(&'static str, Arc<dyn Connector>)>,
) -> usize {
    let mut registered = 0;
    for (name, connector) in candidates {
        match connector.connect().await {
            Ok(()) => {
                state.register_connector(name, connector);
                registered += 1;
            }
            Err(e) => warn!(connector = name, error = %e, "Connector unavailable, skipping"),
        }
    }
    registered
}

async fn connected_state(config: &AgentConfig) -> Arc<StateTracker> {
    let state = Arc::new(config.state_tracker());
    let registered = connect_all(&state, configured_connectors()).await;
    if registered == 0 {
        warn!("No data connectors available; tools will report them as not configured");
    }
    state
}

fn build_agent(config: &AgentConfig, state: Arc<StateTracker>) -> Result<AgentBrain> {
    let gateway_config = GatewayConfig::from_env();
    let gateway = create_gateway(&gateway_config).context("Failed to create model gateway")?;
    info!(provider = %gateway_config.provider, "Model gateway ready");

    inventory_backed(&state);
    let mut agent = AgentBrain::new(gateway, state, Arc::new(config.sandbox()));
    register_inventory_tools(&mut agent, SURREALDB_SOURCE);
    Ok(agent)
}

/// Whether the inventory tools have a connector to query; warns when not.
fn inventory_backed(state: &StateTracker) -> bool {
    if state.get_connector(SURREALDB_SOURCE).is_some() {
        return true;
    }
    warn!(
        connector = SURREALDB_SOURCE,
        "Inventory tools need the SurrealDB connector; build with the `surreal` feature and set SURREALDB_URL"
    );
    false
}

async fn cmd_query(config: &AgentConfig, text: &str) -> Result<()> {
    let state = connected_state(config).await;
    let agent = build_agent(config, state.clone())?;

    let response = agent.process_query(text).await;
    let printed = print_json(&response);

    METRICS.flush();
    state.disconnect_all().await;
    printed
}

async fn cmd_health(config: &AgentConfig) -> Result<()> {
    let state = connected_state(config).await;
    let output = HealthOutput::new(state.health_check_all().await);
    state.disconnect_all().await;
    print_json(&output)
}

fn cmd_check_query(sandbox: &ExecutionSandbox, query: &str) -> Result<()> {
    print_json(&sandbox.validate_query(query))
}

fn parse_context(raw: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw).context("--context is not valid JSON")? {
        Value::Object(map) => Ok(Some(map)),
        other => bail!("--context must be a JSON object, got {other}"),
    }
}

fn cmd_eval(sandbox: &ExecutionSandbox, expression: &str, context: Option<&str>) -> Result<()> {
    let context = parse_context(context)?;
    let _span = QuerySpan::enter("eval");
    print_json(&sandbox.execute_expression(expression, context.as_ref()))
}

fn cmd_tools(config: &AgentConfig) -> Result<()> {
    // Listing schemas needs no connectors; the gateway is never called.
    let state = Arc::new(config.state_tracker());
    let agent = build_agent(config, state)?;
    print_json(&agent.tool_schemas())
}
