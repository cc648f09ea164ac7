//! Freshness tracking for live entities and the named connector registry.
//!
//! The tracker never stores entity data, only when each entity was last
//! fetched from a live source. With a zero threshold every entity is always
//! stale, which forces a live read on every query.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::connector::Connector;

/// Freshness metadata for one `(entity_type, entity_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_type: String,
    pub entity_id: String,
    pub last_updated: DateTime<Utc>,
    pub is_stale: bool,
    pub connector_name: String,
}

type EntityKey = (String, String);

#[derive(Default)]
struct Registry {
    entities: HashMap<EntityKey, EntityState>,
    connectors: HashMap<String, Arc<dyn Connector>>,
}

/// Shared, long-lived tracker. Pass it around behind an `Arc`.
///
/// The internal lock only guards in-memory maps and is never held across an
/// `.await`.
pub struct StateTracker {
    stale_threshold_secs: f64,
    inner: Mutex<Registry>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl std::fmt::Debug for StateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateTracker")
            .field("stale_threshold_secs", &self.stale_threshold_secs)
            .field("entities", &inner.entities.len())
            .field("connectors", &inner.connectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StateTracker {
    /// Negative (or NaN) thresholds behave like zero: always stale.
    pub fn new(stale_threshold_secs: f64) -> Self {
        let stale_threshold_secs = if stale_threshold_secs > 0.0 {
            stale_threshold_secs
        } else {
            0.0
        };
        Self {
            stale_threshold_secs,
            inner: Mutex::new(Registry::default()),
        }
    }

    pub fn stale_threshold_secs(&self) -> f64 {
        self.stale_threshold_secs
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or replace) a connector under `name`.
    pub fn register_connector(&self, name: impl Into<String>, connector: Arc<dyn Connector>) {
        let name = name.into();
        tracing::info!(connector = %name, "connector registered");
        self.lock().connectors.insert(name, connector);
    }

    pub fn get_connector(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.lock().connectors.get(name).cloned()
    }

    /// Registered connector names, sorted.
    pub fn connector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().connectors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Record a fresh live read of an entity.
    pub fn mark_accessed(&self, entity_type: &str, entity_id: &str, connector_name: &str) {
        let state = EntityState {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            last_updated: Utc::now(),
            is_stale: false,
            connector_name: connector_name.to_string(),
        };
        self.lock()
            .entities
            .insert((entity_type.to_string(), entity_id.to_string()), state);
        tracing::debug!(entity_type, entity_id, connector = connector_name, "entity accessed");
    }

    /// Mark one entity stale. Unseen entities are already stale; no-op.
    pub fn invalidate(&self, entity_type: &str, entity_id: &str) {
        let key = (entity_type.to_string(), entity_id.to_string());
        if let Some(state) = self.lock().entities.get_mut(&key) {
            state.is_stale = true;
            tracing::debug!(entity_type, entity_id, "entity invalidated");
        }
    }

    /// Mark every entity stale, or only those of `entity_type`.
    pub fn invalidate_all(&self, entity_type: Option<&str>) {
        let mut inner = self.lock();
        let mut count = 0usize;
        for state in inner.entities.values_mut() {
            if entity_type.map_or(true, |t| state.entity_type == t) {
                state.is_stale = true;
                count += 1;
            }
        }
        tracing::debug!(entity_type = entity_type.unwrap_or("*"), count, "entities invalidated");
    }

    /// Whether data for this entity must be re-fetched before use.
    pub fn is_stale(&self, entity_type: &str, entity_id: &str) -> bool {
        if self.stale_threshold_secs == 0.0 {
            return true;
        }

        let key = (entity_type.to_string(), entity_id.to_string());
        let inner = self.lock();
        let Some(state) = inner.entities.get(&key) else {
            return true;
        };
        if state.is_stale {
            return true;
        }

        let elapsed = Utc::now().signed_duration_since(state.last_updated);
        let elapsed_secs = elapsed.num_microseconds().map_or(f64::MAX, |us| us as f64 / 1e6);
        elapsed_secs > self.stale_threshold_secs
    }

    /// Snapshot of an entity's freshness metadata.
    pub fn entity_state(&self, entity_type: &str, entity_id: &str) -> Option<EntityState> {
        let key = (entity_type.to_string(), entity_id.to_string());
        self.lock().entities.get(&key).cloned()
    }

    /// Probe every registered connector concurrently.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let connectors = self.snapshot_connectors();
        let probes = connectors.iter().map(|(_, c)| c.health_check());
        let results = join_all(probes).await;

        connectors
            .into_iter()
            .map(|(name, _)| name)
            .zip(results)
            .inspect(|(name, healthy)| {
                if !healthy {
                    tracing::warn!(connector = %name, "connector unhealthy");
                }
            })
            .collect()
    }

    /// Disconnect every registered connector. Registrations are kept.
    pub async fn disconnect_all(&self) {
        let connectors = self.snapshot_connectors();
        join_all(connectors.iter().map(|(_, c)| c.disconnect())).await;
        tracing::info!(count = connectors.len(), "connectors disconnected");
    }

    fn snapshot_connectors(&self) -> Vec<(String, Arc<dyn Connector>)> {
        self.lock()
            .connectors
            .iter()
            .map(|(name, c)| (name.clone(), Arc::clone(c)))
            .collect()
    }
}
