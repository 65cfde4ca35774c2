use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integration represents a configured connection to one external datasource
/// (e.g. a Splunk deployment). The configuration blob is adapter-specific and
/// opaque to the rest of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub integration_type: String,
    pub configuration: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        user_id: String,
        name: String,
        integration_type: String,
        configuration: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            name,
            integration_type,
            configuration,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the updated_at timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub name: String,
    pub integration_type: String,
    pub configuration: serde_json::Value,
    /// Optional discovery options applied to the initial discovery run
    pub discovery: Option<crate::services::discovery::DiscoveryOptions>,
}

fn default_user_id() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntegrationRequest {
    pub name: Option<String>,
    pub configuration: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}
