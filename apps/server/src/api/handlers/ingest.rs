//! CSV upload handler
//!
//! Accepts either a raw delimited body or `multipart/form-data` with a `file`
//! part. `name`, `url` and `delimiter` come from the query string or from
//! form fields of the same name; form fields win. An upload that gives
//! neither `name` nor `url` goes to the configured default code system.

use crate::api::fhir_response;
use crate::request_context::RequestContext;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::Response,
    Extension,
};
use medisync_terminology::{parse_delimiter, IngestRequest};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    pub name: Option<String>,
    pub url: Option<String>,
    pub delimiter: Option<String>,
}

#[derive(Debug, Default)]
struct Upload {
    body: Vec<u8>,
    file_name: Option<String>,
    params: IngestParams,
}

/// POST /ingest/csv, POST /ingest/csv-simple
pub async fn ingest_csv(
    State(state): State<AppState>,
    Query(query): Query<IngestParams>,
    context: Option<Extension<RequestContext>>,
    request: Request,
) -> Result<Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let upload = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| Error::InvalidRequest(format!("invalid multipart body: {}", e)))?;
        read_multipart(multipart).await?
    } else {
        let body = Bytes::from_request(request, &state)
            .await
            .map_err(|e| Error::InvalidRequest(format!("unreadable body: {}", e)))?;
        Upload {
            body: body.to_vec(),
            ..Default::default()
        }
    };

    let ingest_request = build_request(&query, &upload, state.config.default_ingest_target())?;
    let request_id = RequestContext::id_of(context.as_deref());

    let code_system = state
        .ingestion
        .ingest_csv(upload.body, ingest_request, request_id)
        .await?;
    Ok(fhir_response(StatusCode::CREATED, code_system))
}

async fn read_multipart(mut multipart: Multipart) -> Result<Upload> {
    let mut upload = Upload::default();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.body = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidRequest(format!("unreadable file part: {}", e)))?
                    .to_vec();
                saw_file = true;
            }
            "name" | "url" | "delimiter" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| {
                        Error::InvalidRequest(format!("unreadable field '{}': {}", name, e))
                    })?;
                match name.as_str() {
                    "name" => upload.params.name = Some(value),
                    "url" => upload.params.url = Some(value),
                    _ => upload.params.delimiter = Some(value),
                }
            }
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }

    if !saw_file {
        return Err(Error::InvalidRequest(
            "multipart upload has no 'file' part".to_string(),
        ));
    }
    Ok(upload)
}

fn build_request(
    query: &IngestParams,
    upload: &Upload,
    default_target: Option<(&str, &str)>,
) -> Result<IngestRequest> {
    let given = |form: &Option<String>, query: &Option<String>| {
        form.as_deref()
            .or(query.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let name = given(&upload.params.name, &query.name);
    let url = given(&upload.params.url, &query.url);

    let (name, url) = match (name, url, default_target) {
        (None, None, Some((name, url))) => (name.to_string(), url.to_string()),
        (name, url, _) => (
            name.ok_or_else(|| {
                Error::InvalidRequest("code system 'name' is required".to_string())
            })?,
            url.ok_or_else(|| Error::InvalidRequest("canonical 'url' is required".to_string()))?,
        ),
    };

    let delimiter = match upload.params.delimiter.as_deref().or(query.delimiter.as_deref()) {
        Some(raw) => parse_delimiter(raw)
            .ok_or_else(|| Error::InvalidRequest(format!("unsupported delimiter '{}'", raw)))?,
        None if is_tsv(upload.file_name.as_deref()) => b'\t',
        None => b',',
    };

    Ok(IngestRequest::new(name, url).with_delimiter(delimiter))
}

fn is_tsv(file_name: Option<&str>) -> bool {
    file_name
        .map(|n| n.to_lowercase().ends_with(".tsv"))
        .unwrap_or(false)
}
