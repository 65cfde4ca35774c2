use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers::integration::AppState;
use crate::api::handlers::{integration, mapping, query, schema};
use crate::config::Config;
use crate::storage::CatalogStorage;

/// Create router with application state
pub fn create_router_with_state(storage: Arc<CatalogStorage>, config: Config) -> Router {
    let state = AppState { storage, config };

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/integrations/available",
            get(integration::list_available_integrations),
        )
        .route(
            "/api/integrations",
            get(integration::list_integrations).post(integration::create_integration),
        )
        .route(
            "/api/integrations/{id}",
            get(integration::get_integration)
                .patch(integration::update_integration)
                .delete(integration::delete_integration),
        )
        .route(
            "/api/integrations/{id}/toggle",
            post(integration::toggle_integration),
        )
        .route(
            "/api/integrations/{id}/collections",
            get(integration::list_collections),
        )
        .route("/api/integrations/{id}/discover", post(integration::discover))
        .route(
            "/api/schemas",
            get(schema::list_schemas).post(schema::create_schema),
        )
        .route(
            "/api/schemas/{id}",
            get(schema::get_schema)
                .patch(schema::update_schema)
                .delete(schema::delete_schema),
        )
        .route("/api/schemas/{id}/fields", post(schema::add_field))
        .route(
            "/api/fields/{id}",
            axum::routing::patch(schema::update_field).delete(schema::delete_field),
        )
        .route(
            "/api/schemas/{id}/mappings",
            get(mapping::list_for_schema),
        )
        .route("/api/mappings", post(mapping::create_mapping))
        .route(
            "/api/mappings/{id}",
            get(mapping::get_mapping).delete(mapping::delete_mapping),
        )
        .route(
            "/api/mappings/{id}/fields",
            put(mapping::update_field_mappings),
        )
        .route("/api/query/convert", post(query::convert_query))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
