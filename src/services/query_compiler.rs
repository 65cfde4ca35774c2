// Fan-out query compilation: one logical query AST becomes one native query
// per collection mapped to the target schema.
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{QueryAst, TranslatedQuery, TranslatedQuerySet};
use crate::services::datasource::{adapter_for, IntegrationType};
use crate::services::mapping_service::SchemaMappingService;
use crate::storage::CatalogStorage;

pub struct QueryCompiler {
    mappings: SchemaMappingService,
}

impl QueryCompiler {
    pub fn new(storage: Arc<CatalogStorage>) -> Self {
        Self {
            mappings: SchemaMappingService::new(storage),
        }
    }

    /// Convert a query AST into native queries for all collections mapped to
    /// its logical schema. Zero mappings is a hard failure; a mapping whose
    /// integration type has no registered adapter is skipped with a warning
    /// so one misconfigured collection cannot block the others.
    pub async fn convert_to_queries(&self, ast: &QueryAst) -> Result<TranslatedQuerySet, AppError> {
        let schema_mappings = self
            .mappings
            .get_mappings_for_schema(&ast.logical_schema_id)
            .await?;

        if schema_mappings.is_empty() {
            return Err(AppError::NotFound(format!(
                "No collections mapped to schema: {}",
                ast.logical_schema_id
            )));
        }

        let mut queries = Vec::new();

        for detail in &schema_mappings {
            let type_tag = &detail.collection.integration.integration_type;
            let integration_type = match IntegrationType::from_str(type_tag) {
                Ok(integration_type) => integration_type,
                Err(_) => {
                    tracing::warn!("No adapter registered for integration type: {}", type_tag);
                    continue;
                }
            };
            let adapter = adapter_for(integration_type);

            // Adapters operate on names, not ids
            let mut field_mappings = HashMap::new();
            for field_mapping in &detail.field_mappings {
                field_mappings.insert(
                    field_mapping.logical_field.name.clone(),
                    field_mapping.physical_field.name.clone(),
                );
            }

            let native_query = adapter.convert_query_ast(ast, &field_mappings);

            queries.push(TranslatedQuery {
                collection_id: detail.collection.collection.id.clone(),
                collection_name: detail.collection.collection.name.clone(),
                integration_type: integration_type.as_str().to_string(),
                query: native_query,
                field_mappings,
            });
        }

        let total_collections = queries.len();
        Ok(TranslatedQuerySet {
            queries,
            total_collections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Collection, CreateMappingRequest, FieldDataType, FieldMappingSpec, FilterCondition,
        Integration, LogicalField, LogicalSchema, PhysicalField,
    };
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        storage: Arc<CatalogStorage>,
        schema: LogicalSchema,
        logical_fields: Vec<LogicalField>,
    }

    /// Seed the `ProcessCreation` schema with fields `{process_name, user}`
    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Arc::new(CatalogStorage::new(dir.path().join("test.db")).await.unwrap());

        let schema = LogicalSchema::new(
            "ProcessCreation".to_string(),
            None,
            None,
            serde_json::Value::Null,
        );
        let logical_fields = vec![
            LogicalField::new(
                schema.id.clone(),
                "process_name".to_string(),
                FieldDataType::String,
                true,
                None,
            ),
            LogicalField::new(
                schema.id.clone(),
                "user".to_string(),
                FieldDataType::String,
                false,
                None,
            ),
        ];
        storage
            .create_logical_schema(&schema, &logical_fields)
            .await
            .unwrap();

        Fixture {
            _dir: dir,
            storage,
            schema,
            logical_fields,
        }
    }

    /// Add a collection under a new integration of the given type, with the
    /// named physical fields, mapped from the fixture schema per `pairs`
    /// (logical index, physical field name).
    async fn add_mapped_collection(
        fixture: &Fixture,
        integration_type: &str,
        collection_name: &str,
        physical_names: &[&str],
        pairs: &[(usize, &str)],
    ) -> Collection {
        let integration = Integration::new(
            "local".to_string(),
            format!("{} integration", integration_type),
            integration_type.to_string(),
            serde_json::Value::Null,
        );
        fixture.storage.save_integration(&integration).await.unwrap();

        let collection = Collection::new(
            integration.id.clone(),
            collection_name.to_string(),
            serde_json::Value::Null,
        );
        fixture.storage.create_collection(&collection).await.unwrap();

        let mut physical_fields = HashMap::new();
        for name in physical_names {
            let field = PhysicalField::new(
                collection.id.clone(),
                name.to_string(),
                FieldDataType::String,
                serde_json::Value::Null,
            );
            fixture.storage.create_physical_field(&field).await.unwrap();
            physical_fields.insert(name.to_string(), field.id);
        }

        let service = SchemaMappingService::new(fixture.storage.clone());
        let field_mappings = pairs
            .iter()
            .map(|(logical, physical)| FieldMappingSpec {
                logical_field_id: fixture.logical_fields[*logical].id.clone(),
                physical_field_id: physical_fields[*physical].clone(),
                transformation: None,
                confidence: Some(0.95),
            })
            .collect();
        service
            .create_mapping(CreateMappingRequest {
                logical_schema_id: fixture.schema.id.clone(),
                collection_id: collection.id.clone(),
                field_mappings,
                metadata: None,
            })
            .await
            .unwrap();

        collection
    }

    #[tokio::test]
    async fn test_compiles_to_splunk_query_through_mapping() {
        let fixture = fixture().await;
        add_mapped_collection(
            &fixture,
            "splunk",
            "index:windows, sourcetype:sysmon",
            &["Image", "User"],
            &[(0, "Image"), (1, "User")],
        )
        .await;

        let compiler = QueryCompiler::new(fixture.storage.clone());
        let ast = QueryAst {
            logical_schema_id: fixture.schema.id.clone(),
            select: None,
            where_clause: Some(FilterCondition::eq("process_name", "cmd.exe")),
            limit: Some(50),
        };

        let result = compiler.convert_to_queries(&ast).await.unwrap();
        assert_eq!(result.total_collections, 1);

        let translated = &result.queries[0];
        assert_eq!(translated.integration_type, "splunk");
        assert_eq!(translated.collection_name, "index:windows, sourcetype:sysmon");
        assert!(translated.query.contains("Image=\"cmd.exe\""));
        assert!(translated.query.ends_with("| head 50"));
        assert_eq!(translated.field_mappings["process_name"], "Image");
    }

    #[tokio::test]
    async fn test_unmapped_field_uses_logical_name_per_collection() {
        let fixture = fixture().await;
        add_mapped_collection(
            &fixture,
            "splunk",
            "index:windows, sourcetype:sysmon",
            &["Image", "User"],
            &[(0, "Image"), (1, "User")],
        )
        .await;
        // Second collection maps only process_name; user is unmapped there
        add_mapped_collection(
            &fixture,
            "splunk",
            "index:windows, sourcetype:security",
            &["NewProcessName"],
            &[(0, "NewProcessName")],
        )
        .await;

        let compiler = QueryCompiler::new(fixture.storage.clone());
        let ast = QueryAst {
            logical_schema_id: fixture.schema.id.clone(),
            select: None,
            where_clause: Some(FilterCondition::eq("user", "alice")),
            limit: None,
        };

        let result = compiler.convert_to_queries(&ast).await.unwrap();
        assert_eq!(result.total_collections, 2);

        let sysmon = result
            .queries
            .iter()
            .find(|q| q.collection_name.contains("sysmon"))
            .unwrap();
        let security = result
            .queries
            .iter()
            .find(|q| q.collection_name.contains("security"))
            .unwrap();

        assert!(sysmon.query.contains("User=\"alice\""));
        assert!(security.query.contains("user=\"alice\""));
    }

    #[tokio::test]
    async fn test_zero_mappings_is_a_hard_failure() {
        let fixture = fixture().await;
        let compiler = QueryCompiler::new(fixture.storage.clone());

        let ast = QueryAst {
            logical_schema_id: fixture.schema.id.clone(),
            select: None,
            where_clause: None,
            limit: None,
        };

        let result = compiler.convert_to_queries(&ast).await;
        match result {
            Err(AppError::NotFound(message)) => {
                assert!(message.contains("No collections mapped to schema"));
            }
            other => panic!("Expected NotFound, got {:?}", other.map(|r| r.total_collections)),
        }
    }

    #[tokio::test]
    async fn test_unknown_integration_type_is_skipped() {
        let fixture = fixture().await;
        add_mapped_collection(
            &fixture,
            "splunk",
            "index:windows, sourcetype:sysmon",
            &["Image"],
            &[(0, "Image")],
        )
        .await;
        // Integration rows carry free-form type tags; this one has no adapter
        add_mapped_collection(
            &fixture,
            "datadog",
            "logs:kubernetes",
            &["proc.name"],
            &[(0, "proc.name")],
        )
        .await;

        let compiler = QueryCompiler::new(fixture.storage.clone());
        let ast = QueryAst {
            logical_schema_id: fixture.schema.id.clone(),
            select: None,
            where_clause: Some(FilterCondition::eq("process_name", "cmd.exe")),
            limit: None,
        };

        let result = compiler.convert_to_queries(&ast).await.unwrap();
        // The unmatched mapping is skipped, not fatal
        assert_eq!(result.total_collections, 1);
        assert_eq!(result.queries[0].integration_type, "splunk");
    }
}
