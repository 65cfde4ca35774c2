use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::handlers::integration::AppState;
use crate::api::middleware::AppError;
use crate::models::{
    CreateLogicalSchemaRequest, LogicalField, LogicalSchema, LogicalSchemaWithFields,
    UpdateLogicalFieldRequest, UpdateLogicalSchemaRequest,
};

async fn load_with_fields(
    state: &AppState,
    schema: LogicalSchema,
) -> Result<LogicalSchemaWithFields, AppError> {
    let logical_fields = state
        .storage
        .find_fields_by_schema(&schema.id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(LogicalSchemaWithFields {
        schema,
        logical_fields,
    })
}

/// List all logical schemas with their fields
pub async fn list_schemas(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let schemas = state
        .storage
        .list_logical_schemas()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let mut detailed = Vec::with_capacity(schemas.len());
    for schema in schemas {
        detailed.push(load_with_fields(&state, schema).await?);
    }

    Ok(Json(serde_json::json!({
        "schemas": detailed
    })))
}

/// Create a new logical schema with fields. Schema names are unique.
pub async fn create_schema(
    State(state): State<AppState>,
    Json(payload): Json<CreateLogicalSchemaRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Schema name cannot be empty".to_string(),
        ));
    }

    let existing = state
        .storage
        .find_schema_by_name(name)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "Logical schema with name \"{}\" already exists",
            name
        )));
    }

    let schema = LogicalSchema::new(
        name.to_string(),
        payload.description,
        payload.version,
        payload.metadata.unwrap_or(serde_json::Value::Null),
    );
    let fields: Vec<LogicalField> = payload
        .fields
        .into_iter()
        .map(|spec| {
            LogicalField::new(
                schema.id.clone(),
                spec.name,
                spec.data_type,
                spec.is_required,
                spec.description,
            )
        })
        .collect();

    state
        .storage
        .create_logical_schema(&schema, &fields)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let detailed = load_with_fields(&state, schema).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(detailed))))
}

/// Get a logical schema by ID
pub async fn get_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let schema = state
        .storage
        .get_logical_schema(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Logical schema {} not found", id)))?;

    let detailed = load_with_fields(&state, schema).await?;
    Ok(Json(serde_json::json!(detailed)))
}

/// Update a logical schema. A name change must not collide with another
/// schema.
pub async fn update_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLogicalSchemaRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut schema = state
        .storage
        .get_logical_schema(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Logical schema {} not found", id)))?;

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Schema name cannot be empty".to_string(),
            ));
        }
        let existing = state
            .storage
            .find_schema_by_name(&name)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if let Some(existing) = existing {
            if existing.id != id {
                return Err(AppError::Validation(format!(
                    "Logical schema with name \"{}\" already exists",
                    name
                )));
            }
        }
        schema.name = name;
    }
    if let Some(description) = payload.description {
        schema.description = Some(description);
    }
    if let Some(version) = payload.version {
        schema.version = Some(version);
    }
    if let Some(metadata) = payload.metadata {
        schema.metadata = metadata;
    }
    schema.touch();

    state
        .storage
        .update_logical_schema(&schema)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    let detailed = load_with_fields(&state, schema).await?;
    Ok(Json(serde_json::json!(detailed)))
}

/// Delete a logical schema (fields and mappings cascade)
pub async fn delete_schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .storage
        .delete_logical_schema(&id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Logical schema {} not found",
            id
        )))
    }
}

/// Add a field to an existing logical schema
pub async fn add_field(
    State(state): State<AppState>,
    Path(schema_id): Path<String>,
    Json(payload): Json<crate::models::LogicalFieldSpec>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Field name cannot be empty".to_string(),
        ));
    }

    state
        .storage
        .get_logical_schema(&schema_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Logical schema {} not found", schema_id)))?;

    let field = LogicalField::new(
        schema_id,
        payload.name,
        payload.data_type,
        payload.is_required,
        payload.description,
    );

    state
        .storage
        .create_logical_field(&field)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(serde_json::json!(field))))
}

/// Update a logical field
pub async fn update_field(
    State(state): State<AppState>,
    Path(field_id): Path<String>,
    Json(payload): Json<UpdateLogicalFieldRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut field = state
        .storage
        .get_logical_field(&field_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Logical field {} not found", field_id)))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "Field name cannot be empty".to_string(),
            ));
        }
        field.name = name;
    }
    if let Some(data_type) = payload.data_type {
        field.data_type = data_type;
    }
    if let Some(description) = payload.description {
        field.description = Some(description);
    }
    if let Some(is_required) = payload.is_required {
        field.is_required = is_required;
    }

    state
        .storage
        .update_logical_field(&field)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(serde_json::json!(field)))
}

/// Delete a logical field
pub async fn delete_field(
    State(state): State<AppState>,
    Path(field_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .storage
        .delete_logical_field(&field_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "Logical field {} not found",
            field_id
        )))
    }
}
