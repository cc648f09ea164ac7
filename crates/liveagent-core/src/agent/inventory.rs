//! Inventory tool pack: live stock lookups through a registered connector.
//!
//! Queries are SurrealQL with named `$` parameters, so they run unchanged on
//! the SurrealDB connector. Record ids are omitted; rows carry `product_id`.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::brain::AgentBrain;
use super::tools::{handler_fn, ToolDefinition};
use crate::connector::QueryParams;
use crate::sandbox::ExecutionSandbox;
use crate::state::StateTracker;

pub const INVENTORY_ENTITY: &str = "inventory";

const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

const QUERY_BY_ID: &str = "SELECT * OMIT id FROM inventory WHERE product_id = $product_id";
const QUERY_BY_NAME: &str = "SELECT * OMIT id FROM inventory \
     WHERE string::lowercase(product_name) CONTAINS string::lowercase($product_name) \
     ORDER BY product_name";
const QUERY_ALL: &str = "SELECT * OMIT id FROM inventory ORDER BY product_name LIMIT 100";
const QUERY_LOW_STOCK: &str =
    "SELECT * OMIT id FROM inventory WHERE quantity <= $threshold ORDER BY quantity ASC";

/// Everything a tool invocation needs, shared by both handlers.
#[derive(Clone)]
struct InventoryTools {
    state: Arc<StateTracker>,
    sandbox: Arc<ExecutionSandbox>,
    connector_name: Arc<str>,
}

impl InventoryTools {
    /// Run `query` on the configured connector and wrap the rows under `key`.
    async fn fetch(
        &self,
        key: &str,
        entity_id: &str,
        query: &str,
        params: Option<QueryParams>,
    ) -> anyhow::Result<Value> {
        let connector = self
            .state
            .get_connector(&self.connector_name)
            .ok_or_else(|| anyhow!("{} connector not configured", self.connector_name))?;

        let result = self
            .sandbox
            .execute_query(connector.as_ref(), query, params.as_ref())
            .await;
        if !result.success {
            bail!("{}", result.error.unwrap_or_default());
        }

        self.state
            .mark_accessed(INVENTORY_ENTITY, entity_id, &self.connector_name);

        let rows = result.result.unwrap_or(Value::Null);
        let count = match &rows {
            Value::Array(items) => items.len(),
            Value::Null => 0,
            _ => 1,
        };
        let mut out = Map::new();
        out.insert(key.to_string(), rows);
        out.insert("count".into(), json!(count));
        out.insert(
            "timestamp".into(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Ok(Value::Object(out))
    }

    async fn product_inventory(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let product_id = string_arg(&args, "product_id")?;
        let product_name = string_arg(&args, "product_name")?;

        let mut params = QueryParams::new();
        let (query, entity_id) = if let Some(id) = product_id {
            params.insert("product_id".into(), Value::String(id.clone()));
            (QUERY_BY_ID, id)
        } else if let Some(name) = product_name {
            params.insert("product_name".into(), Value::String(name.clone()));
            (QUERY_BY_NAME, format!("name:{}", name.to_lowercase()))
        } else {
            (QUERY_ALL, "*".to_string())
        };

        let params = (!params.is_empty()).then_some(params);
        self.fetch("inventory", &entity_id, query, params).await
    }

    async fn low_stock_items(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let threshold = match args.get("threshold") {
            None | Some(Value::Null) => DEFAULT_LOW_STOCK_THRESHOLD,
            Some(v) => v
                .as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| anyhow!("threshold must be an integer, got {v}"))?,
        };

        let mut params = QueryParams::new();
        params.insert("threshold".into(), json!(threshold));
        self.fetch(
            "low_stock_items",
            &format!("low_stock:{threshold}"),
            QUERY_LOW_STOCK,
            Some(params),
        )
        .await
    }
}

/// Optional string argument; empty strings count as absent.
fn string_arg(args: &Map<String, Value>, name: &str) -> anyhow::Result<Option<String>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => bail!("{name} must be a string, got {other}"),
    }
}

/// Register `get_product_inventory` and `get_low_stock_items`, both reading
/// through the connector registered as `connector_name`.
pub fn register_inventory_tools(brain: &mut AgentBrain, connector_name: &str) {
    let tools = InventoryTools {
        state: Arc::clone(brain.state()),
        sandbox: Arc::clone(brain.sandbox()),
        connector_name: Arc::from(connector_name),
    };

    let t = tools.clone();
    brain.register_tool(
        ToolDefinition::new(
            "get_product_inventory",
            "Get live inventory data for products. Use this for ANY question about stock, \
             inventory, or product availability.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {
                        "type": "string",
                        "description": "Specific product ID to look up"
                    },
                    "product_name": {
                        "type": "string",
                        "description": "Product name to search for (partial match)"
                    }
                }
            }),
        )
        .with_handler(handler_fn(move |args| {
            let t = t.clone();
            async move { t.product_inventory(args).await }
        })),
    );

    let t = tools;
    brain.register_tool(
        ToolDefinition::new(
            "get_low_stock_items",
            "Get products with stock below a threshold. Use for questions about low stock, \
             reorder needs, or stock alerts.",
            json!({
                "type": "object",
                "properties": {
                    "threshold": {
                        "type": "integer",
                        "description": "Stock threshold (default 10)",
                        "default": DEFAULT_LOW_STOCK_THRESHOLD
                    }
                }
            }),
        )
        .with_handler(handler_fn(move |args| {
            let t = t.clone();
            async move { t.low_stock_items(args).await }
        })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_arg_rules() {
        let args: Map<String, Value> = serde_json::from_value(json!({
            "a": "widget", "b": "  ", "c": null, "d": 42, "e": [1]
        }))
        .unwrap();
        assert_eq!(string_arg(&args, "a").unwrap().as_deref(), Some("widget"));
        assert_eq!(string_arg(&args, "b").unwrap(), None);
        assert_eq!(string_arg(&args, "c").unwrap(), None);
        assert_eq!(string_arg(&args, "d").unwrap().as_deref(), Some("42"));
        assert_eq!(string_arg(&args, "missing").unwrap(), None);
        assert!(string_arg(&args, "e").is_err());
    }

    #[test]
    fn test_queries_pass_the_read_only_policy() {
        let sandbox = ExecutionSandbox::default();
        for q in [QUERY_BY_ID, QUERY_BY_NAME, QUERY_ALL, QUERY_LOW_STOCK] {
            assert!(sandbox.validate_query(q).is_allowed(), "{q}");
        }
    }
}
