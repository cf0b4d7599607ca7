//! CSV ingestion tests (POST /ingest/csv and /ingest/csv-simple)
//!
//! Tests cover:
//! - Raw and multipart uploads, comma and tab delimiters
//! - Row-level problems reported in the embedded outcome
//! - Version numbering per canonical URL
//! - Fatal header / parameter problems
//! - File-only uploads landing in the default code system

#[allow(unused)]
mod support;

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use support::{
    assert_fhir_json, assert_outcome, assert_status, constants, encode, issue_diagnostics,
    parse_json, seed_namaste, with_test_app, NAMASTE_CSV, NAMASTE_CSV_WITH_PROBLEMS, NAMASTE_TSV,
    UNANI_CSV,
};

#[tokio::test]
async fn raw_csv_creates_version_one() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, body) = app
                .request_with_extra_headers(
                    Method::POST,
                    &format!(
                        "/ingest/csv?name=NAMASTE&url={}",
                        encode(constants::NAMASTE_SYSTEM)
                    ),
                    Some(Bytes::from_static(NAMASTE_CSV.as_bytes())),
                    &[("content-type", "text/csv")],
                )
                .await?;

            assert_status(status, StatusCode::CREATED, "ingest");
            assert_fhir_json(&headers);

            let cs = parse_json(&body)?;
            assert_eq!(cs["resourceType"], "CodeSystem");
            assert_eq!(cs["url"], constants::NAMASTE_SYSTEM);
            assert_eq!(cs["version"], "1");
            assert_eq!(cs["count"], 4);
            assert_eq!(cs["concept"].as_array().map(Vec::len), Some(4));
            assert_eq!(cs["concept"][0]["code"], "NAM001");
            assert_eq!(cs["concept"][0]["definition"], "Fever due to vata dosha");
            assert!(cs["id"].as_str().is_some_and(|id| !id.is_empty()));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn reingest_increments_version() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let first = seed_namaste(app).await?;
            let (status, second) = app
                .ingest("NAMASTE", constants::NAMASTE_SYSTEM, NAMASTE_CSV)
                .await?;
            assert_status(status, StatusCode::CREATED, "second ingest");

            assert_eq!(first["version"], "1");
            assert_eq!(second["version"], "2");
            assert_ne!(first["id"], second["id"]);

            // Other URLs number independently
            let (_, unani) = app
                .ingest("Unani", constants::UNANI_SYSTEM, UNANI_CSV)
                .await?;
            assert_eq!(unani["version"], "1");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn row_problems_are_reported_not_fatal() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, cs) = app
                .ingest("NAMASTE", constants::NAMASTE_SYSTEM, NAMASTE_CSV_WITH_PROBLEMS)
                .await?;
            assert_status(status, StatusCode::CREATED, "ingest with bad rows");

            assert_eq!(cs["count"], 2);
            assert_eq!(
                issue_diagnostics(&cs["outcome"]),
                vec!["ignored_column", "missing_code", "duplicate_code"]
            );
            assert_eq!(cs["outcome"]["issue"][0]["severity"], "information");
            assert_eq!(cs["outcome"]["issue"][1]["severity"], "error");
            assert_eq!(cs["outcome"]["issue"][2]["severity"], "warning");

            // Last occurrence of a duplicate code wins
            let (_, lookup) = app
                .get_json(&format!(
                    "/fhir/CodeSystem/$lookup?system={}&code=NAM001",
                    encode(constants::NAMASTE_SYSTEM)
                ))
                .await?;
            let display = lookup["parameter"]
                .as_array()
                .and_then(|p| p.iter().find(|p| p["name"] == "display"))
                .and_then(|p| p["valueString"].as_str());
            assert_eq!(display, Some("Vataja Jvara (revised)"));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn multipart_tsv_upload_infers_tab() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let boundary = "medisync-boundary";
            let body = format!(
                "--{b}\r\n\
                 Content-Disposition: form-data; name=\"name\"\r\n\r\n\
                 NAMASTE\r\n\
                 --{b}\r\n\
                 Content-Disposition: form-data; name=\"url\"\r\n\r\n\
                 {url}\r\n\
                 --{b}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"namaste.tsv\"\r\n\
                 Content-Type: text/tab-separated-values\r\n\r\n\
                 {tsv}\r\n\
                 --{b}--\r\n",
                b = boundary,
                url = constants::NAMASTE_SYSTEM,
                tsv = NAMASTE_TSV,
            );
            let content_type = format!("multipart/form-data; boundary={boundary}");

            let (status, _headers, body) = app
                .request_with_extra_headers(
                    Method::POST,
                    "/ingest/csv",
                    Some(Bytes::from(body)),
                    &[("content-type", content_type.as_str())],
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "multipart ingest");

            let cs = parse_json(&body)?;
            assert_eq!(cs["count"], 2);
            assert_eq!(cs["concept"][1]["display"], "Pittaja Jvara");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn file_only_upload_goes_to_default_code_system() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let boundary = "medisync-boundary";
            let body = format!(
                "--{b}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"sample_namaste_codes.csv\"\r\n\
                 Content-Type: text/csv\r\n\r\n\
                 {csv}\r\n\
                 --{b}--\r\n",
                b = boundary,
                csv = NAMASTE_CSV,
            );
            let content_type = format!("multipart/form-data; boundary={boundary}");

            let (status, _headers, body) = app
                .request_with_extra_headers(
                    Method::POST,
                    "/ingest/csv-simple",
                    Some(Bytes::from(body)),
                    &[("content-type", content_type.as_str())],
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "file-only upload");

            let cs = parse_json(&body)?;
            assert_eq!(cs["url"], constants::NAMASTE_SYSTEM);
            assert_eq!(cs["version"], "1");
            assert_eq!(cs["count"], 4);

            // A URL without a name is still incomplete
            let (status, _headers, _body) = app
                .request_with_extra_headers(
                    Method::POST,
                    &format!("/ingest/csv-simple?url={}", encode(constants::UNANI_SYSTEM)),
                    Some(Bytes::from_static(UNANI_CSV.as_bytes())),
                    &[("content-type", "text/csv")],
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "url without name");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn missing_code_column_is_unprocessable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, outcome) = app
                .ingest("NAMASTE", constants::NAMASTE_SYSTEM, "name,description\nA,B\n")
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "missing code column");
            assert_outcome(&outcome, "error");

            // Nothing stored, so the next good upload is still version 1
            let cs = seed_namaste(app).await?;
            assert_eq!(cs["version"], "1");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn no_usable_rows_is_unprocessable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, outcome) = app
                .ingest("NAMASTE", constants::NAMASTE_SYSTEM, "code,display\n,x\n")
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "empty input");
            assert_outcome(&outcome, "error");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn missing_parameters_are_bad_requests() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request_with_extra_headers(
                    Method::POST,
                    &format!("/ingest/csv?url={}", encode(constants::NAMASTE_SYSTEM)),
                    Some(Bytes::from_static(NAMASTE_CSV.as_bytes())),
                    &[("content-type", "text/csv")],
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "missing name");
            assert_outcome(&parse_json(&body)?, "error");

            let (status, _headers, _body) = app
                .request_with_extra_headers(
                    Method::POST,
                    &format!(
                        "/ingest/csv?name=NAMASTE&url={}&delimiter=double",
                        encode(constants::NAMASTE_SYSTEM)
                    ),
                    Some(Bytes::from_static(NAMASTE_CSV.as_bytes())),
                    &[("content-type", "text/csv")],
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "bad delimiter");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn ingestion_is_audited() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed_namaste(app).await?;

            // The audit drain runs in the background
            let mut records = Vec::new();
            for _ in 0..50 {
                records = app.store.audit_records().await;
                if !records.is_empty() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].action, "ingest");
            assert_eq!(records[0].outcome, "success");
            assert_eq!(records[0].target.as_deref(), Some(constants::NAMASTE_SYSTEM));
            assert!(records[0].request_id.is_some());
            Ok(())
        })
    })
    .await
}
