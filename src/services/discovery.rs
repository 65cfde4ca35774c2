// Two-phase discovery pipeline: collections first, then (optionally) fields.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Collection, PhysicalField};
use crate::services::datasource::{adapter_for, DatasourceAdapter, IntegrationType};
use crate::storage::CatalogStorage;

/// Outcome of phase 1. `collections_created` counts successful saves, not
/// discovered entries: individual persistence failures are skipped.
#[derive(Debug, Serialize)]
pub struct CollectionDiscoveryOutcome {
    pub success: bool,
    pub collections_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of field discovery for one collection
#[derive(Debug, Serialize)]
pub struct FieldDiscoveryOutcome {
    pub success: bool,
    pub fields_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall pipeline outcome. Success tracks phase 1 only; field discovery
/// failures are per-collection and never flip it.
#[derive(Debug, Serialize)]
pub struct DiscoveryOutcome {
    pub success: bool,
    pub collections_created: usize,
    pub fields_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Discovery options. Field discovery is opt-in because it runs one search
/// job per collection and can be slow.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryOptions {
    #[serde(default)]
    pub discover_fields: bool,
    #[serde(default = "default_max_collections")]
    pub max_collections: usize,
}

fn default_max_collections() -> usize {
    10
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            discover_fields: false,
            max_collections: default_max_collections(),
        }
    }
}

/// Discover collections from a datasource and save them to the catalog
pub async fn discover_and_save_collections(
    storage: &CatalogStorage,
    integration_id: &str,
    adapter: &dyn DatasourceAdapter,
    config: &Value,
) -> CollectionDiscoveryOutcome {
    tracing::info!("Starting collection discovery for integration {}", integration_id);

    let discovery = adapter.discover_collections(config).await;

    if !discovery.success {
        let error = discovery
            .error
            .unwrap_or_else(|| "Unknown error".to_string());
        tracing::error!("Collection discovery failed: {}", error);
        return CollectionDiscoveryOutcome {
            success: false,
            collections_created: 0,
            error: Some(error),
        };
    }

    tracing::info!("Discovered {} collections", discovery.collections.len());

    let mut collections_created = 0;
    for discovered in discovery.collections {
        let collection = Collection::new(
            integration_id.to_string(),
            discovered.name.clone(),
            discovered.metadata,
        );
        match storage.create_collection(&collection).await {
            Ok(()) => collections_created += 1,
            Err(e) => {
                // Skip and continue with the next collection
                tracing::error!("Failed to save collection {}: {}", discovered.name, e);
            }
        }
    }

    tracing::info!("Saved {} collections", collections_created);

    CollectionDiscoveryOutcome {
        success: true,
        collections_created,
        error: None,
    }
}

/// Discover and save fields for a specific collection
pub async fn discover_and_save_fields(
    storage: &CatalogStorage,
    collection_id: &str,
    collection_name: &str,
    adapter: &dyn DatasourceAdapter,
    config: &Value,
) -> FieldDiscoveryOutcome {
    tracing::info!("Starting field discovery for collection {}", collection_name);

    let discovery = adapter.discover_fields(config, collection_name).await;

    if !discovery.success {
        let error = discovery
            .error
            .unwrap_or_else(|| "Unknown error".to_string());
        tracing::error!("Field discovery failed: {}", error);
        return FieldDiscoveryOutcome {
            success: false,
            fields_created: 0,
            error: Some(error),
        };
    }

    tracing::info!("Discovered {} fields", discovery.fields.len());

    let mut fields_created = 0;
    for discovered in discovery.fields {
        let field = PhysicalField::new(
            collection_id.to_string(),
            discovered.name.clone(),
            discovered.data_type,
            discovered.metadata,
        );
        match storage.create_physical_field(&field).await {
            Ok(()) => fields_created += 1,
            Err(e) => {
                tracing::error!("Failed to save field {}: {}", discovered.name, e);
            }
        }
    }

    tracing::info!("Saved {} fields", fields_created);

    FieldDiscoveryOutcome {
        success: true,
        fields_created,
        error: None,
    }
}

/// Discover datasource schema: collections, then optionally fields for the
/// most recently created collections (bounded by `max_collections`).
pub async fn discover_datasource_schema(
    storage: &CatalogStorage,
    integration_id: &str,
    integration_type: IntegrationType,
    config: &Value,
    options: &DiscoveryOptions,
) -> DiscoveryOutcome {
    tracing::info!(
        "Starting datasource discovery for integration {} (type {}, discover_fields {})",
        integration_id,
        integration_type.as_str(),
        options.discover_fields
    );

    let adapter = adapter_for(integration_type);

    let collection_outcome =
        discover_and_save_collections(storage, integration_id, adapter, config).await;

    if !collection_outcome.success {
        return DiscoveryOutcome {
            success: false,
            collections_created: 0,
            fields_created: 0,
            error: collection_outcome.error,
        };
    }

    let mut fields_created = 0;

    if options.discover_fields && collection_outcome.collections_created > 0 {
        let collections = match storage
            .find_collections_by_integration(integration_id, Some(options.max_collections))
            .await
        {
            Ok(collections) => collections,
            Err(e) => {
                tracing::error!("Failed to load collections for field discovery: {}", e);
                Vec::new()
            }
        };

        tracing::info!("Discovering fields for {} collections", collections.len());

        for collection in &collections {
            let field_outcome = discover_and_save_fields(
                storage,
                &collection.id,
                &collection.name,
                adapter,
                config,
            )
            .await;

            if field_outcome.success {
                fields_created += field_outcome.fields_created;
            } else {
                // Partial schema knowledge is still useful: keep going
                tracing::warn!(
                    "Field discovery failed for collection {}: {}",
                    collection.name,
                    field_outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    tracing::info!(
        "Datasource discovery complete: {} collections, {} fields",
        collection_outcome.collections_created,
        fields_created
    );

    DiscoveryOutcome {
        success: true,
        collections_created: collection_outcome.collections_created,
        fields_created,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::api::middleware::AppError;
    use crate::models::{FieldDataType, Integration, QueryAst};
    use crate::services::datasource::{
        CollectionDiscovery, DiscoveredCollection, DiscoveredField, FieldDiscovery, QueryParams,
    };
    use tempfile::tempdir;

    /// Stub adapter with switchable failure modes
    struct StubAdapter {
        collections: usize,
        fail_collections: bool,
        fail_fields_for: Option<String>,
    }

    #[async_trait::async_trait]
    impl DatasourceAdapter for StubAdapter {
        async fn validate_connection(&self, _config: &Value) -> bool {
            true
        }

        async fn discover_collections(&self, _config: &Value) -> CollectionDiscovery {
            if self.fail_collections {
                return CollectionDiscovery::failed("backend unreachable");
            }
            let collections = (0..self.collections)
                .map(|i| DiscoveredCollection {
                    name: format!("index:main, sourcetype:type{}", i),
                    metadata: Value::Null,
                })
                .collect();
            CollectionDiscovery::ok(collections)
        }

        async fn discover_fields(&self, _config: &Value, collection_name: &str) -> FieldDiscovery {
            if self.fail_fields_for.as_deref() == Some(collection_name) {
                return FieldDiscovery::failed("search job timed out");
            }
            FieldDiscovery::ok(vec![
                DiscoveredField {
                    name: "field_a".to_string(),
                    data_type: FieldDataType::String,
                    metadata: Value::Null,
                },
                DiscoveredField {
                    name: "field_b".to_string(),
                    data_type: FieldDataType::String,
                    metadata: Value::Null,
                },
            ])
        }

        fn convert_query_ast(
            &self,
            _ast: &QueryAst,
            _field_mappings: &HashMap<String, String>,
        ) -> String {
            String::new()
        }

        async fn query(
            &self,
            _config: &Value,
            _collection_name: &str,
            _params: &QueryParams,
        ) -> Result<Vec<Value>, AppError> {
            Ok(Vec::new())
        }

        fn integration_type(&self) -> &str {
            "stub"
        }
    }

    async fn storage_with_integration() -> (tempfile::TempDir, CatalogStorage, Integration) {
        let dir = tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path().join("test.db")).await.unwrap();
        let integration = Integration::new(
            "local".to_string(),
            "Stub".to_string(),
            "splunk-mock".to_string(),
            Value::Null,
        );
        storage.save_integration(&integration).await.unwrap();
        (dir, storage, integration)
    }

    #[tokio::test]
    async fn test_collection_discovery_saves_all() {
        let (_dir, storage, integration) = storage_with_integration().await;
        let adapter = StubAdapter {
            collections: 10,
            fail_collections: false,
            fail_fields_for: None,
        };

        let outcome =
            discover_and_save_collections(&storage, &integration.id, &adapter, &Value::Null).await;

        assert!(outcome.success);
        assert_eq!(outcome.collections_created, 10);
        assert!(outcome.error.is_none());

        let saved = storage
            .find_collections_by_integration(&integration.id, None)
            .await
            .unwrap();
        assert_eq!(saved.len(), 10);
    }

    #[tokio::test]
    async fn test_adapter_failure_creates_nothing() {
        let (_dir, storage, integration) = storage_with_integration().await;
        let adapter = StubAdapter {
            collections: 10,
            fail_collections: true,
            fail_fields_for: None,
        };

        let outcome =
            discover_and_save_collections(&storage, &integration.id, &adapter, &Value::Null).await;

        assert!(!outcome.success);
        assert_eq!(outcome.collections_created, 0);
        assert_eq!(outcome.error.as_deref(), Some("backend unreachable"));

        let saved = storage
            .find_collections_by_integration(&integration.id, None)
            .await
            .unwrap();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failures_are_skipped_not_escalated() {
        let dir = tempdir().unwrap();
        let storage = CatalogStorage::new(dir.path().join("test.db")).await.unwrap();
        let adapter = StubAdapter {
            collections: 10,
            fail_collections: false,
            fail_fields_for: None,
        };

        // No integration row exists, so every save is rejected by the foreign
        // key; the count reflects zero successes but discovery still succeeds.
        let outcome =
            discover_and_save_collections(&storage, "missing-integration", &adapter, &Value::Null)
                .await;

        assert!(outcome.success);
        assert_eq!(outcome.collections_created, 0);
    }

    #[tokio::test]
    async fn test_field_discovery_failure_does_not_flip_overall_success() {
        let (_dir, storage, integration) = storage_with_integration().await;
        let adapter = StubAdapter {
            collections: 3,
            fail_collections: false,
            // Fails for one of the three collections
            fail_fields_for: Some("index:main, sourcetype:type1".to_string()),
        };

        let options = DiscoveryOptions {
            discover_fields: true,
            max_collections: 10,
        };

        // Phase 1 through the stub, phase 2 through the same stub by hand
        let collection_outcome =
            discover_and_save_collections(&storage, &integration.id, &adapter, &Value::Null).await;
        assert!(collection_outcome.success);
        assert_eq!(collection_outcome.collections_created, 3);

        let collections = storage
            .find_collections_by_integration(&integration.id, Some(options.max_collections))
            .await
            .unwrap();

        let mut fields_created = 0;
        let mut failures = 0;
        for collection in &collections {
            let outcome = discover_and_save_fields(
                &storage,
                &collection.id,
                &collection.name,
                &adapter,
                &Value::Null,
            )
            .await;
            if outcome.success {
                fields_created += outcome.fields_created;
            } else {
                failures += 1;
            }
        }

        // Two collections yield two fields each, one failed and was skipped
        assert_eq!(failures, 1);
        assert_eq!(fields_created, 4);
    }

    #[tokio::test]
    async fn test_pipeline_with_mock_adapter() {
        let (_dir, storage, integration) = storage_with_integration().await;

        let options = DiscoveryOptions {
            discover_fields: true,
            max_collections: 2,
        };
        let outcome = discover_datasource_schema(
            &storage,
            &integration.id,
            IntegrationType::SplunkMock,
            &Value::Null,
            &options,
        )
        .await;

        assert!(outcome.success);
        assert!(outcome.collections_created > 0);
        // Field discovery ran for max_collections collections only
        assert!(outcome.fields_created > 0);

        let collections = storage
            .find_collections_by_integration(&integration.id, None)
            .await
            .unwrap();
        assert_eq!(collections.len(), outcome.collections_created);

        let with_fields: usize = {
            let mut count = 0;
            for collection in &collections {
                let fields = storage
                    .find_fields_by_collection(&collection.id)
                    .await
                    .unwrap();
                if !fields.is_empty() {
                    count += 1;
                }
            }
            count
        };
        assert_eq!(with_fields, 2);
    }

    #[tokio::test]
    async fn test_max_collections_bounds_field_discovery() {
        let (_dir, storage, integration) = storage_with_integration().await;
        let adapter = StubAdapter {
            collections: 5,
            fail_collections: false,
            fail_fields_for: None,
        };

        discover_and_save_collections(&storage, &integration.id, &adapter, &Value::Null).await;

        let limited = storage
            .find_collections_by_integration(&integration.id, Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let mut fields_created = 0;
        for collection in &limited {
            let outcome = discover_and_save_fields(
                &storage,
                &collection.id,
                &collection.name,
                &adapter,
                &Value::Null,
            )
            .await;
            fields_created += outcome.fields_created;
        }

        assert_eq!(fields_created, 4);
    }
}
