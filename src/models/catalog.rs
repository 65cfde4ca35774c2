use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inferred data type of a field. Discovery degrades to String when the
/// vendor cannot supply stronger typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldDataType {
    String,
    Number,
    Boolean,
    Timestamp,
    Json,
}

impl FieldDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldDataType::String => "STRING",
            FieldDataType::Number => "NUMBER",
            FieldDataType::Boolean => "BOOLEAN",
            FieldDataType::Timestamp => "TIMESTAMP",
            FieldDataType::Json => "JSON",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STRING" => Some(FieldDataType::String),
            "NUMBER" => Some(FieldDataType::Number),
            "BOOLEAN" => Some(FieldDataType::Boolean),
            "TIMESTAMP" => Some(FieldDataType::Timestamp),
            "JSON" => Some(FieldDataType::Json),
            _ => None,
        }
    }
}

/// Collection is a discovered addressable grouping of events within an
/// integration (e.g. a Splunk index+sourcetype combination). The name is
/// adapter-defined and must parse back into adapter-specific coordinates.
/// Rows are append-only: re-discovery creates new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub integration_id: String,
    pub name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(integration_id: String, name: String, metadata: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            integration_id,
            name,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// PhysicalField is a field observed within a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalField {
    pub id: String,
    pub collection_id: String,
    pub name: String,
    pub data_type: FieldDataType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PhysicalField {
    pub fn new(
        collection_id: String,
        name: String,
        data_type: FieldDataType,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection_id,
            name,
            data_type,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_data_type_round_trip() {
        for data_type in [
            FieldDataType::String,
            FieldDataType::Number,
            FieldDataType::Boolean,
            FieldDataType::Timestamp,
            FieldDataType::Json,
        ] {
            assert_eq!(FieldDataType::parse(data_type.as_str()), Some(data_type));
        }
        assert_eq!(FieldDataType::parse("blob"), None);
    }

    #[test]
    fn test_field_data_type_wire_format() {
        let serialized = serde_json::to_string(&FieldDataType::String).unwrap();
        assert_eq!(serialized, "\"STRING\"");
    }
}
