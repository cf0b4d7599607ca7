//! Bundle upload handler

use crate::api::fhir_response;
use crate::request_context::RequestContext;
use crate::state::AppState;
use crate::Result;
use axum::{body::Bytes, extract::State, http::StatusCode, response::Response, Extension};
use medisync_terminology::FatalMalformation;
use serde_json::Value as JsonValue;

/// POST /bundle/upload
///
/// 200 with a `batch-response` Bundle whenever the payload is a processable
/// bundle, whatever the per-entry verdicts; 400 with a fatal
/// OperationOutcome otherwise.
pub async fn upload_bundle(
    State(state): State<AppState>,
    context: Option<Extension<RequestContext>>,
    body: Bytes,
) -> Result<Response> {
    let bundle: JsonValue = serde_json::from_slice(&body).map_err(|e| {
        FatalMalformation::new("not_a_bundle", format!("body is not valid JSON: {}", e))
    })?;

    let request_id = RequestContext::id_of(context.as_deref());
    let response = state.bundles.upload(&bundle, request_id).await?;
    Ok(fhir_response(StatusCode::OK, response))
}
