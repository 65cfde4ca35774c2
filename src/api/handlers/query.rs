use axum::{extract::State, Json};

use crate::api::handlers::integration::AppState;
use crate::api::middleware::AppError;
use crate::models::ConvertQueryRequest;
use crate::services::query_compiler::QueryCompiler;

/// Convert a query AST into native queries for every collection mapped to
/// the target logical schema
pub async fn convert_query(
    State(state): State<AppState>,
    Json(payload): Json<ConvertQueryRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!(
        "Converting query for schema: {}",
        payload.query_ast.logical_schema_id
    );

    let compiler = QueryCompiler::new(state.storage.clone());
    let result = compiler.convert_to_queries(&payload.query_ast).await?;

    Ok(Json(serde_json::json!(result)))
}
