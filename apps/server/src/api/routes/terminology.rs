//! Ingestion, search, lookup and CodeSystem read routes

use crate::api::handlers::{ingest, terminology};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn terminology_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/csv", post(ingest::ingest_csv))
        .route("/ingest/csv-simple", post(ingest::ingest_csv))
        .route("/valueset/search", get(terminology::search))
        .route("/fhir/ValueSet/$expand", get(terminology::search))
        .route("/fhir/CodeSystem/$lookup", get(terminology::lookup))
        .route("/fhir/CodeSystem/:id", get(terminology::read_code_system))
        .route("/fhir/CodeSystem", get(terminology::code_system_versions))
}
