// Datasource adapter trait for multi-backend support
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::middleware::AppError;
use crate::models::{FieldDataType, QueryAst};

/// A collection discovered from a datasource
/// (e.g. a Splunk index+sourcetype combination)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredCollection {
    pub name: String,
    pub metadata: Value,
}

/// A physical field discovered from a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredField {
    pub name: String,
    pub data_type: FieldDataType,
    pub metadata: Value,
}

/// Result of collection discovery. Failures are reported in-band so batch
/// callers can continue past individual bad sources.
#[derive(Debug)]
pub struct CollectionDiscovery {
    pub success: bool,
    pub collections: Vec<DiscoveredCollection>,
    pub error: Option<String>,
}

impl CollectionDiscovery {
    pub fn ok(collections: Vec<DiscoveredCollection>) -> Self {
        Self {
            success: true,
            collections,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            collections: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Result of field discovery for a specific collection
#[derive(Debug)]
pub struct FieldDiscovery {
    pub success: bool,
    pub fields: Vec<DiscoveredField>,
    pub error: Option<String>,
}

impl FieldDiscovery {
    pub fn ok(fields: Vec<DiscoveredField>) -> Self {
        Self {
            success: true,
            fields,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Parameters for executing a native query against a collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    pub search: Option<String>,
    pub earliest_time: Option<String>,
    pub latest_time: Option<String>,
    pub limit: Option<usize>,
}

/// Datasource adapter trait - abstraction layer for external log/telemetry
/// platforms. The registry holds a single shared instance per type, so
/// implementations must be stateless: connection configuration is passed on
/// every call.
#[async_trait::async_trait]
pub trait DatasourceAdapter: Send + Sync {
    /// Liveness check against the backend. Expected failure modes
    /// (unreachable host, bad credentials) return false rather than erroring.
    async fn validate_connection(&self, config: &Value) -> bool;

    /// Discover all available collections from the datasource
    async fn discover_collections(&self, config: &Value) -> CollectionDiscovery;

    /// Discover the fields of a specific collection. Must accept any `name`
    /// emitted by `discover_collections` unchanged.
    async fn discover_fields(&self, config: &Value, collection_name: &str) -> FieldDiscovery;

    /// Render a query AST into a native query string through a
    /// logical-name -> physical-name table. Pure and deterministic; never
    /// fails: unmapped fields fall back to the logical name verbatim and
    /// unknown operators render as equality.
    fn convert_query_ast(&self, ast: &QueryAst, field_mappings: &HashMap<String, String>)
        -> String;

    /// Execute a native query against a collection. Unlike discovery,
    /// exhausting the poll budget is a hard error: a caller awaiting results
    /// must be told none arrived.
    async fn query(
        &self,
        config: &Value,
        collection_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Value>, AppError>;

    /// Integration type tag this adapter serves
    fn integration_type(&self) -> &str;
}
