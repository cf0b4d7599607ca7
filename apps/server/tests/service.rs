//! Service surface tests: health, metrics, request ids and error bodies

#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use support::{
    assert_fhir_json, assert_outcome, assert_status, parse_json, seed_namaste, with_test_app,
};

#[tokio::test]
async fn health_reports_index_state() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, health) = app.get_json("/health").await?;
            assert_status(status, StatusCode::OK, "health");
            assert_eq!(health["status"], "ok");
            assert_eq!(health["storage"], "ok");
            assert_eq!(health["indexedCodes"], 0);

            seed_namaste(app).await?;
            let (_, health) = app.get_json("/health").await?;
            assert_eq!(health["indexedCodes"], 4);
            assert!(health["indexGeneration"].as_u64().unwrap_or_default() >= 1);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn responses_carry_request_ids() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (_, headers, _) = app
                .request_with_extra_headers(
                    Method::GET,
                    "/health",
                    None,
                    &[("x-request-id", "client-supplied-42")],
                )
                .await?;

            let request_id = headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            assert!(uuid::Uuid::parse_str(request_id).is_ok(), "got '{request_id}'");
            assert_eq!(
                headers.get("x-correlation-id").and_then(|v| v.to_str().ok()),
                Some("client-supplied-42")
            );
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed_namaste(app).await?;
            app.get_json("/valueset/search?q=jvara").await?;

            let (status, headers, body) = app.request(Method::GET, "/metrics", None).await?;
            assert_status(status, StatusCode::OK, "metrics");
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            assert!(content_type.starts_with("text/plain"), "got '{content_type}'");

            let text = String::from_utf8(body.to_vec())?;
            assert!(text.contains("medisync_search_requests_total"));
            assert!(text.contains("medisync_code_system_versions_total"));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn unknown_routes_and_errors_use_operation_outcome() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, body) = app
                .request(Method::GET, "/fhir/CodeSystem/$lookup?system=x", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "missing code");
            assert_fhir_json(&headers);
            let outcome = parse_json(&body)?;
            assert_outcome(&outcome, "error");
            assert_eq!(outcome["issue"][0]["code"], "invalid");

            let (status, _, _) = app.request(Method::GET, "/no/such/route", None).await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown route");
            Ok(())
        })
    })
    .await
}
