use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Basic comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperator {
    Eq,
    Contains,
    Gt,
    Lt,
    /// Operators this build does not know deserialize here and render as equality
    Unknown,
}

impl<'de> Deserialize<'de> for QueryOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "eq" => QueryOperator::Eq,
            "contains" => QueryOperator::Contains,
            "gt" => QueryOperator::Gt,
            "lt" => QueryOperator::Lt,
            _ => QueryOperator::Unknown,
        })
    }
}

/// Logical operators for combining conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

/// A filter condition: either a single comparison or a logical combination
/// of child conditions. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterCondition {
    Comparison {
        field: String,
        operator: QueryOperator,
        value: serde_json::Value,
    },
    Logical {
        operator: LogicalOperator,
        conditions: Vec<FilterCondition>,
    },
}

impl FilterCondition {
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        FilterCondition::Comparison {
            field: field.into(),
            operator: QueryOperator::Eq,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        FilterCondition::Comparison {
            field: field.into(),
            operator: QueryOperator::Contains,
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        FilterCondition::Comparison {
            field: field.into(),
            operator: QueryOperator::Gt,
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        FilterCondition::Comparison {
            field: field.into(),
            operator: QueryOperator::Lt,
            value: value.into(),
        }
    }

    pub fn and(conditions: Vec<FilterCondition>) -> Self {
        FilterCondition::Logical {
            operator: LogicalOperator::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<FilterCondition>) -> Self {
        FilterCondition::Logical {
            operator: LogicalOperator::Or,
            conditions,
        }
    }
}

/// Vendor-neutral query expression against a logical schema.
/// Transient: constructed per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAst {
    pub logical_schema_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<FilterCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQueryRequest {
    pub query_ast: QueryAst,
}

/// One native query produced for a mapped collection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedQuery {
    pub collection_id: String,
    pub collection_name: String,
    pub integration_type: String,
    pub query: String,
    pub field_mappings: HashMap<String, String>,
}

/// Fan-out result: one entry per mapped collection that could be translated
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedQuerySet {
    pub queries: Vec<TranslatedQuery>,
    pub total_collections: usize,
}
