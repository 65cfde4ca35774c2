use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{Collection, PhysicalField};
use super::integration::Integration;
use super::schema::{LogicalField, LogicalSchemaWithFields};

/// SchemaMapping binds one logical schema to one collection. Deleting it
/// cascades to its field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMapping {
    pub id: String,
    pub logical_schema_id: String,
    pub collection_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchemaMapping {
    pub fn new(
        logical_schema_id: String,
        collection_id: String,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            logical_schema_id,
            collection_id,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// FieldMapping links one logical field to one physical field within the
/// context of a schema mapping. Confidence, when present, is bounded [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub id: String,
    pub mapping_id: String,
    pub logical_field_id: String,
    pub physical_field_id: String,
    pub transformation: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl FieldMapping {
    pub fn new(
        mapping_id: String,
        logical_field_id: String,
        physical_field_id: String,
        transformation: Option<String>,
        confidence: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mapping_id,
            logical_field_id,
            physical_field_id,
            transformation,
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// One field-mapping entry as submitted by a caller
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMappingSpec {
    pub logical_field_id: String,
    pub physical_field_id: String,
    pub transformation: Option<String>,
    pub confidence: Option<f64>,
}

impl FieldMappingSpec {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!(
                    "Confidence must be between 0 and 1 (got {})",
                    confidence
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub logical_schema_id: String,
    pub collection_id: String,
    pub field_mappings: Vec<FieldMappingSpec>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldMappingsRequest {
    pub field_mappings: Vec<FieldMappingSpec>,
}

/// Collection with its physical fields and owning integration eagerly loaded
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub physical_fields: Vec<PhysicalField>,
    pub integration: Integration,
}

/// Field mapping with both of its ends eagerly loaded
#[derive(Debug, Clone, Serialize)]
pub struct FieldMappingDetail {
    #[serde(flatten)]
    pub field_mapping: FieldMapping,
    pub logical_field: LogicalField,
    pub physical_field: PhysicalField,
}

/// Fully-detailed schema mapping, the shape the query compiler consumes.
/// The logical schema is only loaded for single-mapping lookups.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaMappingDetail {
    #[serde(flatten)]
    pub mapping: SchemaMapping,
    pub collection: CollectionDetail,
    pub field_mappings: Vec<FieldMappingDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_schema: Option<LogicalSchemaWithFields>,
}
