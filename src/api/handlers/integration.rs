use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{CreateIntegrationRequest, Integration, UpdateIntegrationRequest};
use crate::services::datasource::{
    adapter_for, validate_integration_config, IntegrationType, AVAILABLE_INTEGRATIONS,
};
use crate::services::discovery::{discover_datasource_schema, DiscoveryOptions};
use crate::storage::CatalogStorage;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<CatalogStorage>,
    pub config: Config,
}

fn default_options(config: &Config) -> DiscoveryOptions {
    DiscoveryOptions {
        discover_fields: false,
        max_collections: config.discovery.max_collections,
    }
}

/// List the integration types this deployment supports
pub async fn list_available_integrations() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "integrations": AVAILABLE_INTEGRATIONS
    }))
}

/// List all configured integrations
pub async fn list_integrations(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let integrations = state
        .storage
        .list_integrations()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "integrations": integrations
    })))
}

/// Create a new integration: validate the configuration, test the
/// connection, persist the record, then run initial discovery.
pub async fn create_integration(
    State(state): State<AppState>,
    Json(payload): Json<CreateIntegrationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Integration name cannot be empty".to_string(),
        ));
    }

    let integration_type = IntegrationType::from_str(&payload.integration_type)?;
    validate_integration_config(integration_type, &payload.configuration)?;

    let adapter = adapter_for(integration_type);
    if !adapter.validate_connection(&payload.configuration).await {
        return Err(AppError::Connection(format!(
            "Connection validation failed for integration type: {}",
            integration_type.as_str()
        )));
    }

    let integration = Integration::new(
        payload.user_id,
        payload.name,
        integration_type.as_str().to_string(),
        payload.configuration,
    );

    state
        .storage
        .save_integration(&integration)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!("Created integration {}, running initial discovery", integration.id);

    let options = payload
        .discovery
        .unwrap_or_else(|| default_options(&state.config));
    let discovery = discover_datasource_schema(
        &state.storage,
        &integration.id,
        integration_type,
        &integration.configuration,
        &options,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "integration": integration,
            "discovery": discovery,
        })),
    ))
}

/// Get integration details
pub async fn get_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let integration = state
        .storage
        .get_integration(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Integration {} not found", id)))?;

    Ok(Json(serde_json::json!(integration)))
}

/// Update an integration's name, configuration, or active flag
pub async fn update_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateIntegrationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut integration = state
        .storage
        .get_integration(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Integration {} not found", id)))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "Integration name cannot be empty".to_string(),
            ));
        }
        integration.name = name;
    }
    if let Some(configuration) = payload.configuration {
        let integration_type = IntegrationType::from_str(&integration.integration_type)?;
        validate_integration_config(integration_type, &configuration)?;
        integration.configuration = configuration;
    }
    if let Some(is_active) = payload.is_active {
        integration.is_active = is_active;
    }
    integration.touch();

    state
        .storage
        .save_integration(&integration)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!(integration)))
}

/// Toggle the active flag. Deactivation is soft: the record and its
/// discovered catalog stay in place.
pub async fn toggle_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut integration = state
        .storage
        .get_integration(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Integration {} not found", id)))?;

    integration.is_active = !integration.is_active;
    integration.touch();

    state
        .storage
        .save_integration(&integration)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!(integration)))
}

/// Delete an integration
pub async fn delete_integration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("Deleting integration: {}", id);

    let deleted = state
        .storage
        .delete_integration(&id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete integration {}: {}", id, e);
            AppError::Database(e.to_string())
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Integration {} not found", id)))
    }
}

/// List the collections discovered for an integration
pub async fn list_collections(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .storage
        .get_integration(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Integration {} not found", id)))?;

    let collections = state
        .storage
        .find_collections_by_integration(&id, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "collections": collections
    })))
}

/// Re-run discovery for an integration
pub async fn discover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<DiscoveryOptions>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let integration = state
        .storage
        .get_integration(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Integration {} not found", id)))?;

    let integration_type = IntegrationType::from_str(&integration.integration_type)?;
    let options = payload
        .map(|Json(options)| options)
        .unwrap_or_else(|| default_options(&state.config));

    let outcome = discover_datasource_schema(
        &state.storage,
        &integration.id,
        integration_type,
        &integration.configuration,
        &options,
    )
    .await;

    Ok(Json(serde_json::json!(outcome)))
}
