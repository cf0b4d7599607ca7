//! API layer - routes, handlers, and middleware

pub mod handlers;
pub mod middleware;
pub mod routes;

use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value as JsonValue};

pub const FHIR_JSON: &str = "application/fhir+json; charset=utf-8";

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_request_body_size;
    let cors_origins = state.config.server.cors_origins.clone();

    Router::new()
        .route("/health", get(health_check))
        .merge(routes::terminology::terminology_routes())
        .merge(routes::bundle::bundle_routes())
        .merge(routes::metrics::metrics_routes())
        .with_state(state)
        // Applied in reverse order
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::metrics_middleware))
        .layer(middleware::compression())
        .layer(middleware::cors(&cors_origins))
        .layer(DefaultBodyLimit::max(max_body_size))
}

/// JSON body with the FHIR content type
pub fn fhir_response(status: StatusCode, body: JsonValue) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
    response
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let storage = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "store ping failed");
            "unavailable"
        }
    };
    Json(json!({
        "status": "ok",
        "service": "medisync",
        "version": env!("CARGO_PKG_VERSION"),
        "indexGeneration": state.index.generation(),
        "indexedCodes": state.index.snapshot().len(),
        "storage": storage,
    }))
}
