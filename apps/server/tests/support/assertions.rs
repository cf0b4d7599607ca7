use anyhow::Context as _;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "{context}: expected status {expected}, got {actual}"
    );
}

/// Assert the response carries the FHIR JSON media type
pub fn assert_fhir_json(headers: &HeaderMap) {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        content_type.starts_with("application/fhir+json"),
        "expected application/fhir+json, got '{content_type}'"
    );
}

/// Assert that a response is a Bundle of the given type
pub fn assert_bundle_type<'a>(bundle: &'a Value, bundle_type: &str) -> anyhow::Result<&'a Value> {
    assert_eq!(
        bundle.get("resourceType").and_then(|v| v.as_str()),
        Some("Bundle"),
        "expected Bundle resource type"
    );
    assert_eq!(
        bundle.get("type").and_then(|v| v.as_str()),
        Some(bundle_type),
        "expected Bundle.type = {bundle_type}"
    );
    Ok(bundle)
}

/// Get Bundle entries as array
pub fn get_bundle_entries(bundle: &Value) -> anyhow::Result<&Vec<Value>> {
    bundle
        .get("entry")
        .and_then(|v| v.as_array())
        .context("Bundle.entry is array")
}

/// `response.status` of every entry, in order
pub fn entry_statuses(bundle: &Value) -> anyhow::Result<Vec<String>> {
    get_bundle_entries(bundle)?
        .iter()
        .map(|e| {
            e.pointer("/response/status")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .context("entry.response.status")
        })
        .collect()
}

/// Value of a bundle-summary extension (`total`, `accepted`, ...)
pub fn summary_count(bundle: &Value, name: &str) -> anyhow::Result<i64> {
    let suffix = format!("-{name}");
    bundle
        .get("extension")
        .and_then(|v| v.as_array())
        .context("Bundle.extension is array")?
        .iter()
        .find(|ext| {
            ext.get("url")
                .and_then(|v| v.as_str())
                .map(|url| url.ends_with(&suffix))
                .unwrap_or(false)
        })
        .and_then(|ext| ext.get("valueInteger"))
        .and_then(|v| v.as_i64())
        .with_context(|| format!("summary extension '{name}'"))
}

/// Diagnostics codes of an OperationOutcome, in order
pub fn issue_diagnostics(outcome: &Value) -> Vec<String> {
    outcome
        .get("issue")
        .and_then(|v| v.as_array())
        .map(|issues| {
            issues
                .iter()
                .filter_map(|i| i.get("diagnostics").and_then(|d| d.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Assert an OperationOutcome whose first issue has the given severity
pub fn assert_outcome(outcome: &Value, severity: &str) {
    assert_eq!(
        outcome.get("resourceType").and_then(|v| v.as_str()),
        Some("OperationOutcome"),
        "expected OperationOutcome, got {outcome}"
    );
    assert_eq!(
        outcome.pointer("/issue/0/severity").and_then(|v| v.as_str()),
        Some(severity),
        "unexpected first issue severity in {outcome}"
    );
}

/// Codes listed in a ValueSet expansion, in order
pub fn expansion_codes(value_set: &Value) -> Vec<String> {
    value_set
        .pointer("/expansion/contains")
        .and_then(|v| v.as_array())
        .map(|contains| {
            contains
                .iter()
                .filter_map(|c| c.get("code").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
