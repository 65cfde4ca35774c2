use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{
    CollectionDetail, CreateMappingRequest, FieldMapping, FieldMappingDetail, FieldMappingSpec,
    LogicalSchemaWithFields, SchemaMapping, SchemaMappingDetail,
};
use crate::storage::CatalogStorage;

/// Service managing the many-to-many association between logical schemas and
/// collections, with field-level mappings carrying transformation and
/// confidence metadata.
pub struct SchemaMappingService {
    storage: Arc<CatalogStorage>,
}

impl SchemaMappingService {
    pub fn new(storage: Arc<CatalogStorage>) -> Self {
        Self { storage }
    }

    /// Get all mappings for a logical schema with full collection,
    /// physical-field, and field-mapping detail. This is the single call the
    /// query compiler builds its name tables from.
    pub async fn get_mappings_for_schema(
        &self,
        logical_schema_id: &str,
    ) -> Result<Vec<SchemaMappingDetail>, AppError> {
        let mappings = self
            .storage
            .find_mappings_by_schema(logical_schema_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut details = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            details.push(self.load_detail(mapping, false).await?);
        }
        Ok(details)
    }

    /// Get a specific mapping by ID, with the logical schema loaded as well
    pub async fn get_mapping_by_id(
        &self,
        id: &str,
    ) -> Result<Option<SchemaMappingDetail>, AppError> {
        let mapping = self
            .storage
            .get_mapping(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match mapping {
            Some(mapping) => Ok(Some(self.load_detail(mapping, true).await?)),
            None => Ok(None),
        }
    }

    /// Create a new schema-to-collection mapping with its field mappings
    pub async fn create_mapping(
        &self,
        request: CreateMappingRequest,
    ) -> Result<SchemaMappingDetail, AppError> {
        for spec in &request.field_mappings {
            spec.validate().map_err(AppError::Validation)?;
        }

        self.storage
            .get_logical_schema(&request.logical_schema_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Logical schema {} not found",
                    request.logical_schema_id
                ))
            })?;
        self.storage
            .get_collection(&request.collection_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFound(format!("Collection {} not found", request.collection_id))
            })?;

        let mapping = SchemaMapping::new(
            request.logical_schema_id,
            request.collection_id,
            request.metadata.unwrap_or(serde_json::Value::Null),
        );
        let field_mappings: Vec<FieldMapping> = request
            .field_mappings
            .into_iter()
            .map(|spec| {
                FieldMapping::new(
                    mapping.id.clone(),
                    spec.logical_field_id,
                    spec.physical_field_id,
                    spec.transformation,
                    spec.confidence,
                )
            })
            .collect();

        self.storage
            .create_mapping(&mapping, &field_mappings)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.load_detail(mapping, false).await
    }

    /// Replace-all update of a mapping's field mappings: every existing entry
    /// is deleted, then the submitted set is inserted. Callers must resend
    /// the full desired set; this is deliberately not a diff or upsert.
    pub async fn update_field_mappings(
        &self,
        mapping_id: &str,
        specs: Vec<FieldMappingSpec>,
    ) -> Result<SchemaMappingDetail, AppError> {
        for spec in &specs {
            spec.validate().map_err(AppError::Validation)?;
        }

        let mapping = self
            .storage
            .get_mapping(mapping_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFound(format!("Schema mapping {} not found", mapping_id))
            })?;

        self.storage
            .delete_field_mappings_by_mapping(mapping_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let field_mappings: Vec<FieldMapping> = specs
            .into_iter()
            .map(|spec| {
                FieldMapping::new(
                    mapping_id.to_string(),
                    spec.logical_field_id,
                    spec.physical_field_id,
                    spec.transformation,
                    spec.confidence,
                )
            })
            .collect();

        self.storage
            .create_field_mappings(&field_mappings)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.load_detail(mapping, false).await
    }

    /// Delete a mapping; its field mappings go with it
    pub async fn delete_mapping(&self, id: &str) -> Result<(), AppError> {
        let deleted = self
            .storage
            .delete_mapping(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if deleted {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "Schema mapping {} not found",
                id
            )))
        }
    }

    /// Get the field mappings between a logical schema and a collection.
    /// Returns an empty set when no mapping exists.
    pub async fn get_field_mappings(
        &self,
        logical_schema_id: &str,
        collection_id: &str,
    ) -> Result<Vec<FieldMappingDetail>, AppError> {
        let mapping = self
            .storage
            .find_mapping_by_schema_and_collection(logical_schema_id, collection_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match mapping {
            Some(mapping) => self.load_field_mapping_details(&mapping.id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn load_field_mapping_details(
        &self,
        mapping_id: &str,
    ) -> Result<Vec<FieldMappingDetail>, AppError> {
        let raw = self
            .storage
            .find_field_mappings_by_mapping(mapping_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut details = Vec::with_capacity(raw.len());
        for field_mapping in raw {
            let logical_field = self
                .storage
                .get_logical_field(&field_mapping.logical_field_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Logical field {} not found",
                        field_mapping.logical_field_id
                    ))
                })?;
            let physical_field = self
                .storage
                .get_physical_field(&field_mapping.physical_field_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Physical field {} not found",
                        field_mapping.physical_field_id
                    ))
                })?;

            details.push(FieldMappingDetail {
                field_mapping,
                logical_field,
                physical_field,
            });
        }
        Ok(details)
    }

    async fn load_detail(
        &self,
        mapping: SchemaMapping,
        include_schema: bool,
    ) -> Result<SchemaMappingDetail, AppError> {
        let collection = self
            .storage
            .get_collection(&mapping.collection_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFound(format!("Collection {} not found", mapping.collection_id))
            })?;
        let physical_fields = self
            .storage
            .find_fields_by_collection(&collection.id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let integration = self
            .storage
            .get_integration(&collection.integration_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Integration {} not found",
                    collection.integration_id
                ))
            })?;

        let field_mappings = self.load_field_mapping_details(&mapping.id).await?;

        let logical_schema = if include_schema {
            let schema = self
                .storage
                .get_logical_schema(&mapping.logical_schema_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Logical schema {} not found",
                        mapping.logical_schema_id
                    ))
                })?;
            let logical_fields = self
                .storage
                .find_fields_by_schema(&schema.id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Some(LogicalSchemaWithFields {
                schema,
                logical_fields,
            })
        } else {
            None
        };

        Ok(SchemaMappingDetail {
            mapping,
            collection: CollectionDetail {
                collection,
                physical_fields,
                integration,
            },
            field_mappings,
            logical_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Collection, FieldDataType, Integration, LogicalField, LogicalSchema, PhysicalField,
    };
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        storage: Arc<CatalogStorage>,
        schema: LogicalSchema,
        collection: Collection,
        logical_fields: Vec<LogicalField>,
        physical_fields: Vec<PhysicalField>,
    }

    /// Seed a schema `{process_name, user}` and a collection with physical
    /// fields `{Image, User}`
    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let storage = Arc::new(CatalogStorage::new(dir.path().join("test.db")).await.unwrap());

        let integration = Integration::new(
            "local".to_string(),
            "Splunk".to_string(),
            "splunk".to_string(),
            serde_json::json!({"host": "https://splunk.example.com", "api-key": "k"}),
        );
        storage.save_integration(&integration).await.unwrap();

        let collection = Collection::new(
            integration.id.clone(),
            "index:windows, sourcetype:sysmon".to_string(),
            serde_json::Value::Null,
        );
        storage.create_collection(&collection).await.unwrap();

        let physical_fields = vec![
            PhysicalField::new(
                collection.id.clone(),
                "Image".to_string(),
                FieldDataType::String,
                serde_json::Value::Null,
            ),
            PhysicalField::new(
                collection.id.clone(),
                "User".to_string(),
                FieldDataType::String,
                serde_json::Value::Null,
            ),
        ];
        for field in &physical_fields {
            storage.create_physical_field(field).await.unwrap();
        }

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
            collection,
            logical_fields,
            physical_fields,
        }
    }

    fn spec(fixture: &Fixture, logical: usize, physical: usize) -> FieldMappingSpec {
        FieldMappingSpec {
            logical_field_id: fixture.logical_fields[logical].id.clone(),
            physical_field_id: fixture.physical_fields[physical].id.clone(),
            transformation: None,
            confidence: Some(0.9),
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch_mapping_detail() {
        let fixture = fixture().await;
        let service = SchemaMappingService::new(fixture.storage.clone());

        let detail = service
            .create_mapping(CreateMappingRequest {
                logical_schema_id: fixture.schema.id.clone(),
                collection_id: fixture.collection.id.clone(),
                field_mappings: vec![spec(&fixture, 0, 0), spec(&fixture, 1, 1)],
                metadata: None,
            })
            .await
            .unwrap();

        assert_eq!(detail.field_mappings.len(), 2);
        assert_eq!(detail.collection.collection.id, fixture.collection.id);
        assert_eq!(detail.collection.integration.integration_type, "splunk");
        assert_eq!(detail.collection.physical_fields.len(), 2);

        let mappings = service
            .get_mappings_for_schema(&fixture.schema.id)
            .await
            .unwrap();
        assert_eq!(mappings.len(), 1);

        // Single lookup additionally loads the logical schema
        let by_id = service
            .get_mapping_by_id(&detail.mapping.id)
            .await
            .unwrap()
            .unwrap();
        let schema = by_id.logical_schema.unwrap();
        assert_eq!(schema.schema.name, "ProcessCreation");
        assert_eq!(schema.logical_fields.len(), 2);
    }

    #[tokio::test]
    async fn test_confidence_out_of_bounds_is_rejected() {
        let fixture = fixture().await;
        let service = SchemaMappingService::new(fixture.storage.clone());

        let mut bad = spec(&fixture, 0, 0);
        bad.confidence = Some(1.5);

        let result = service
            .create_mapping(CreateMappingRequest {
                logical_schema_id: fixture.schema.id.clone(),
                collection_id: fixture.collection.id.clone(),
                field_mappings: vec![bad],
                metadata: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_field_mappings_is_replace_all() {
        let fixture = fixture().await;
        let service = SchemaMappingService::new(fixture.storage.clone());

        let detail = service
            .create_mapping(CreateMappingRequest {
                logical_schema_id: fixture.schema.id.clone(),
                collection_id: fixture.collection.id.clone(),
                field_mappings: vec![spec(&fixture, 0, 0), spec(&fixture, 1, 1)],
                metadata: None,
            })
            .await
            .unwrap();

        // Resend a single-entry set: the result must be exactly that set
        let updated = service
            .update_field_mappings(&detail.mapping.id, vec![spec(&fixture, 0, 0)])
            .await
            .unwrap();
        assert_eq!(updated.field_mappings.len(), 1);
        assert_eq!(
            updated.field_mappings[0].logical_field.name,
            "process_name"
        );

        let fetched = service
            .get_field_mappings(&fixture.schema.id, &fixture.collection.id)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].physical_field.name, "Image");

        // Empty set empties the mapping
        let emptied = service
            .update_field_mappings(&detail.mapping.id, Vec::new())
            .await
            .unwrap();
        assert!(emptied.field_mappings.is_empty());
    }

    #[tokio::test]
    async fn test_get_field_mappings_without_mapping_is_empty() {
        let fixture = fixture().await;
        let service = SchemaMappingService::new(fixture.storage.clone());

        let fetched = service
            .get_field_mappings(&fixture.schema.id, &fixture.collection.id)
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_delete_mapping_cascades() {
        let fixture = fixture().await;
        let service = SchemaMappingService::new(fixture.storage.clone());

        let detail = service
            .create_mapping(CreateMappingRequest {
                logical_schema_id: fixture.schema.id.clone(),
                collection_id: fixture.collection.id.clone(),
                field_mappings: vec![spec(&fixture, 0, 0)],
                metadata: None,
            })
            .await
            .unwrap();

        service.delete_mapping(&detail.mapping.id).await.unwrap();

        let gone = service.get_mapping_by_id(&detail.mapping.id).await.unwrap();
        assert!(gone.is_none());

        let fetched = service
            .get_field_mappings(&fixture.schema.id, &fixture.collection.id)
            .await
            .unwrap();
        assert!(fetched.is_empty());

        // Deleting again reports not found
        let again = service.delete_mapping(&detail.mapping.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }
}
