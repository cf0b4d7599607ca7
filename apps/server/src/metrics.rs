//! Prometheus metrics for the MediSync server

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec,
};

lazy_static! {
    // HTTP

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medisync_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "medisync_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "medisync_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    // Ingestion

    /// Rows seen by CSV ingestion, by outcome (accepted, rejected, duplicate)
    pub static ref INGESTION_ROWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medisync_ingestion_rows_total",
        "Rows processed by CSV ingestion",
        &["outcome"]
    )
    .expect("Failed to register INGESTION_ROWS_TOTAL");

    pub static ref CODE_SYSTEM_VERSIONS_TOTAL: IntCounter = register_int_counter!(
        "medisync_code_system_versions_total",
        "Code system versions published"
    )
    .expect("Failed to register CODE_SYSTEM_VERSIONS_TOTAL");

    // Search

    pub static ref SEARCH_REQUESTS_TOTAL: IntCounter = register_int_counter!(
        "medisync_search_requests_total",
        "Terminology search requests"
    )
    .expect("Failed to register SEARCH_REQUESTS_TOTAL");

    pub static ref SEARCH_RESULTS: Histogram = register_histogram!(
        "medisync_search_results",
        "Total matches per terminology search",
        vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1000.0]
    )
    .expect("Failed to register SEARCH_RESULTS");

    pub static ref INDEX_GENERATION: IntGauge = register_int_gauge!(
        "medisync_index_generation",
        "Generation of the published search index"
    )
    .expect("Failed to register INDEX_GENERATION");

    pub static ref INDEX_ENTRIES: IntGauge = register_int_gauge!(
        "medisync_index_entries",
        "Entries in the published search index"
    )
    .expect("Failed to register INDEX_ENTRIES");

    // Bundles

    /// Bundle entries by response status code (201, 400, 503)
    pub static ref BUNDLE_ENTRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "medisync_bundle_entries_total",
        "Bundle entries processed, by response status",
        &["status"]
    )
    .expect("Failed to register BUNDLE_ENTRIES_TOTAL");

    pub static ref BUNDLE_PROCESSING_SECONDS: Histogram = register_histogram!(
        "medisync_bundle_processing_seconds",
        "Time to process one uploaded bundle",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register BUNDLE_PROCESSING_SECONDS");

    // Audit

    pub static ref AUDIT_EVENTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "medisync_audit_events_dropped_total",
        "Audit events dropped because the queue was full or closed"
    )
    .expect("Failed to register AUDIT_EVENTS_DROPPED_TOTAL");
}

/// Collapse a request path to a route label with bounded cardinality
pub fn sanitize_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    match path {
        "" => "/".to_string(),
        "/health" | "/metrics" | "/ingest/csv" | "/valueset/search" | "/bundle/upload"
        | "/fhir/ValueSet/$expand" | "/fhir/CodeSystem/$lookup" | "/fhir/CodeSystem" => {
            path.to_string()
        }
        p if p.starts_with("/fhir/CodeSystem/") => "/fhir/CodeSystem/{id}".to_string(),
        _ => "other".to_string(),
    }
}

/// Publish the index gauges
pub fn record_index(generation: u64, entries: usize) {
    INDEX_GENERATION.set(generation as i64);
    INDEX_ENTRIES.set(entries as i64);
}
