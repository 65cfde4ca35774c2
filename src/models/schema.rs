use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::FieldDataType;

/// LogicalSchema is a user-authored, vendor-neutral schema. Names are unique
/// across the catalog; uniqueness is checked before create/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalSchema {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalSchema {
    pub fn new(
        name: String,
        description: Option<String>,
        version: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            version,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// LogicalField is one field of a logical schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalField {
    pub id: String,
    pub schema_id: String,
    pub name: String,
    pub data_type: FieldDataType,
    pub is_required: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LogicalField {
    pub fn new(
        schema_id: String,
        name: String,
        data_type: FieldDataType,
        is_required: bool,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_id,
            name,
            data_type,
            is_required,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Schema with its fields eagerly loaded, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct LogicalSchemaWithFields {
    #[serde(flatten)]
    pub schema: LogicalSchema,
    pub logical_fields: Vec<LogicalField>,
}

#[derive(Debug, Deserialize)]
pub struct LogicalFieldSpec {
    pub name: String,
    pub data_type: FieldDataType,
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateLogicalSchemaRequest {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub fields: Vec<LogicalFieldSpec>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLogicalSchemaRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLogicalFieldRequest {
    pub name: Option<String>,
    pub data_type: Option<FieldDataType>,
    pub description: Option<String>,
    pub is_required: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let schema = LogicalSchema::new(
            "ProcessCreation".to_string(),
            Some("Process creation events".to_string()),
            Some("1.0".to_string()),
            serde_json::Value::Null,
        );

        assert_eq!(schema.name, "ProcessCreation");
        assert_eq!(schema.id.len(), 36);
    }

    #[test]
    fn test_field_spec_defaults() {
        let json = r#"{"name": "user", "data_type": "STRING"}"#;
        let spec: LogicalFieldSpec = serde_json::from_str(json).unwrap();
        assert!(!spec.is_required);
        assert!(spec.description.is_none());
    }
}
