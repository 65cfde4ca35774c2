// Datasource abstraction layer for multi-backend support
pub mod adapter;
pub mod splunk;
pub mod splunk_mock;

pub use adapter::{
    CollectionDiscovery, DatasourceAdapter, DiscoveredCollection, DiscoveredField, FieldDiscovery,
    QueryParams,
};
pub use splunk::SplunkAdapter;
pub use splunk_mock::SplunkMockAdapter;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::middleware::AppError;

/// Integration type enum. A closed set: dispatching on it is exhaustive at
/// compile time, and an unknown tag is a caller error at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationType {
    Splunk,
    SplunkMock,
}

impl IntegrationType {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "splunk" => Ok(IntegrationType::Splunk),
            "splunk-mock" | "splunk_mock" => Ok(IntegrationType::SplunkMock),
            _ => Err(AppError::Validation(format!(
                "Unsupported integration type: {}",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationType::Splunk => "splunk",
            IntegrationType::SplunkMock => "splunk-mock",
        }
    }
}

static SPLUNK: SplunkAdapter = SplunkAdapter;
static SPLUNK_MOCK: SplunkMockAdapter = SplunkMockAdapter;

/// Look up the shared adapter instance for an integration type. Adapters are
/// stateless; configuration is passed on every call, so one instance safely
/// serves every integration of its type.
pub fn adapter_for(integration_type: IntegrationType) -> &'static dyn DatasourceAdapter {
    match integration_type {
        IntegrationType::Splunk => &SPLUNK,
        IntegrationType::SplunkMock => &SPLUNK_MOCK,
    }
}

/// One configuration field an integration type expects
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// User-facing definition of an available integration type
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub config_fields: &'static [ConfigField],
}

const SPLUNK_CONFIG_FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "host",
        field_type: "url",
        description: "Splunk host, including scheme",
        required: true,
    },
    ConfigField {
        name: "management-port",
        field_type: "text",
        description: "Management API port (defaults to 8089)",
        required: false,
    },
    ConfigField {
        name: "api-key",
        field_type: "password",
        description: "Your Splunk API key",
        required: true,
    },
];

const SPLUNK_DEFINITION: IntegrationDefinition = IntegrationDefinition {
    id: "splunk",
    name: "Splunk",
    description: "Connect to Splunk for log analysis",
    config_fields: SPLUNK_CONFIG_FIELDS,
};

const SPLUNK_MOCK_DEFINITION: IntegrationDefinition = IntegrationDefinition {
    id: "splunk-mock",
    name: "Splunk (mock)",
    description: "Generated Splunk data for local development",
    config_fields: &[],
};

pub const AVAILABLE_INTEGRATIONS: &[IntegrationDefinition] =
    &[SPLUNK_DEFINITION, SPLUNK_MOCK_DEFINITION];

pub fn definition_for(integration_type: IntegrationType) -> &'static IntegrationDefinition {
    match integration_type {
        IntegrationType::Splunk => &SPLUNK_DEFINITION,
        IntegrationType::SplunkMock => &SPLUNK_MOCK_DEFINITION,
    }
}

/// Validate a configuration blob against the integration's definition:
/// every required field must be present and non-empty.
pub fn validate_integration_config(
    integration_type: IntegrationType,
    config: &Value,
) -> Result<(), AppError> {
    if !config.is_object() {
        return Err(AppError::Validation(
            "Configuration must be an object".to_string(),
        ));
    }

    let definition = definition_for(integration_type);
    for field in definition.config_fields {
        if field.required {
            let present = config
                .get(field.name)
                .and_then(Value::as_str)
                .map(|v| !v.is_empty())
                .unwrap_or(false);
            if !present {
                return Err(AppError::Validation(format!(
                    "Missing required configuration field: {}",
                    field.name
                )));
            }
        }
    }

    Ok(())
}
