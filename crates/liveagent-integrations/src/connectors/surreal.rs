//! SurrealDB connector: SurrealQL queries with named parameters.

use async_trait::async_trait;
use liveagent_core::{Connector, ConnectorError, QueryParams, QueryResult};
use serde_json::Value;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tokio::sync::RwLock;

use super::SURREALDB_SOURCE;

/// Connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SurrealConfig {
    /// Any engine URL: `mem://`, `surrealkv://path`, `ws://host:port`, `wss://...`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sign in as a root user rather than a database user.
    pub is_root: bool,
}

impl Default for SurrealConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: "liveagent".to_string(),
            database: "main".to_string(),
            username: None,
            password: None,
            is_root: false,
        }
    }
}

impl SurrealConfig {
    /// `SURREALDB_URL`, `SURREALDB_NAMESPACE`, `SURREALDB_DATABASE`,
    /// `SURREALDB_USERNAME`, `SURREALDB_PASSWORD`, `SURREALDB_ROOT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("SURREALDB_URL").unwrap_or(defaults.url),
            namespace: std::env::var("SURREALDB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("SURREALDB_DATABASE").unwrap_or(defaults.database),
            username: std::env::var("SURREALDB_USERNAME").ok(),
            password: std::env::var("SURREALDB_PASSWORD").ok(),
            is_root: std::env::var("SURREALDB_ROOT")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
        }
    }
}

pub struct SurrealConnector {
    config: SurrealConfig,
    db: RwLock<Option<Surreal<Any>>>,
}

impl SurrealConnector {
    pub fn new(config: SurrealConfig) -> Self {
        Self {
            config,
            db: RwLock::new(None),
        }
    }

    async fn open(&self) -> Result<Surreal<Any>, String> {
        let config = &self.config;
        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| format!("failed to connect to {}: {e}", config.url))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if config.is_root {
                db.signin(Root { username, password })
                    .await
                    .map_err(|e| format!("root auth failed: {e}"))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username,
                    password,
                })
                .await
                .map_err(|e| format!("database auth failed: {e}"))?;
            }
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| e.to_string())?;
        Ok(db)
    }

    async fn handle(&self) -> Option<Surreal<Any>> {
        self.db.read().await.clone()
    }
}

#[async_trait]
impl Connector for SurrealConnector {
    async fn connect(&self) -> Result<(), ConnectorError> {
        let db = self.open().await.map_err(|reason| ConnectorError::Connection {
            connector: SURREALDB_SOURCE.to_string(),
            reason,
        })?;
        *self.db.write().await = Some(db);
        tracing::info!(
            url = %self.config.url,
            namespace = %self.config.namespace,
            database = %self.config.database,
            "SurrealDB connector ready"
        );
        Ok(())
    }

    async fn disconnect(&self) {
        self.db.write().await.take();
    }

    async fn query(&self, request: &str, params: Option<&QueryParams>) -> QueryResult {
        let Some(db) = self.handle().await else {
            return QueryResult::failure(SURREALDB_SOURCE, "Not connected to database");
        };

        let mut query = db.query(request.to_string());
        for (name, value) in params.into_iter().flatten() {
            query = query.bind((name.clone(), value.clone()));
        }

        let mut response = match query.await {
            Ok(response) => response,
            Err(e) => return QueryResult::failure(SURREALDB_SOURCE, e.to_string()),
        };
        let rows: Vec<Value> = match response.take(0) {
            Ok(rows) => rows,
            Err(e) => return QueryResult::failure(SURREALDB_SOURCE, e.to_string()),
        };

        let data = Value::Array(rows);
        if !self.validate(&data).await {
            return QueryResult::failure(SURREALDB_SOURCE, "Data validation failed");
        }
        QueryResult::ok(SURREALDB_SOURCE, data)
    }

    async fn validate(&self, data: &Value) -> bool {
        data.is_array()
    }

    async fn health_check(&self) -> bool {
        let Some(db) = self.handle().await else {
            return false;
        };
        match db.query("RETURN 1").await {
            Ok(mut response) => response.take::<Option<i64>>(0).is_ok(),
            Err(e) => {
                tracing::debug!(error = %e, "SurrealDB health probe failed");
                false
            }
        }
    }
}
