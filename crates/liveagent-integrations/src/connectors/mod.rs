//! Data-source connectors.

pub mod rest;
#[cfg(feature = "surreal")]
pub mod surreal;

/// Source tag of [`rest::RestApiConnector`] results.
pub const REST_API_SOURCE: &str = "rest_api";

/// Source tag of `surreal::SurrealConnector` results.
pub const SURREALDB_SOURCE: &str = "surrealdb";
