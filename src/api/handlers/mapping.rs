use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::handlers::integration::AppState;
use crate::api::middleware::AppError;
use crate::models::{CreateMappingRequest, UpdateFieldMappingsRequest};
use crate::services::mapping_service::SchemaMappingService;

/// List all mappings for a logical schema, with full detail
pub async fn list_for_schema(
    State(state): State<AppState>,
    Path(schema_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = SchemaMappingService::new(state.storage.clone());
    let mappings = service.get_mappings_for_schema(&schema_id).await?;

    Ok(Json(serde_json::json!({
        "mappings": mappings
    })))
}

/// Create a new schema-to-collection mapping with field mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(payload): Json<CreateMappingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let service = SchemaMappingService::new(state.storage.clone());
    let detail = service.create_mapping(payload).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!(detail))))
}

/// Get a specific mapping by ID
pub async fn get_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = SchemaMappingService::new(state.storage.clone());
    let detail = service
        .get_mapping_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Schema mapping {} not found", id)))?;

    Ok(Json(serde_json::json!(detail)))
}

/// Replace the field mappings of an existing mapping with the submitted set
pub async fn update_field_mappings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateFieldMappingsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = SchemaMappingService::new(state.storage.clone());
    let detail = service
        .update_field_mappings(&id, payload.field_mappings)
        .await?;

    Ok(Json(serde_json::json!(detail)))
}

/// Delete a schema-to-collection mapping
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = SchemaMappingService::new(state.storage.clone());
    service.delete_mapping(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
