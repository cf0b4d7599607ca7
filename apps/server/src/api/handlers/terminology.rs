//! Terminology read handlers

use crate::api::fhir_response;
use crate::state::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

/// Accepts both the plain (`q`, `limit`) and the FHIR (`filter`, `count`) names
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub filter: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "_count")]
    pub underscore_count: Option<String>,
    pub count: Option<String>,
    pub offset: Option<String>,
}

impl SearchParams {
    fn query(&self) -> &str {
        self.q
            .as_deref()
            .or(self.filter.as_deref())
            .unwrap_or("")
    }

    fn limit(&self) -> Result<Option<usize>> {
        let raw = self
            .limit
            .as_deref()
            .or(self.count.as_deref())
            .or(self.underscore_count.as_deref());
        parse_non_negative("limit", raw)
    }

    fn offset(&self) -> Result<Option<usize>> {
        parse_non_negative("offset", self.offset.as_deref())
    }
}

fn parse_non_negative(name: &str, raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse::<usize>().map(Some).map_err(|_| {
            Error::InvalidRequest(format!(
                "{} must be a non-negative integer, got '{}'",
                name, value
            ))
        }),
    }
}

/// GET /valueset/search and /fhir/ValueSet/$expand
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response> {
    let limit = params.limit()?;
    let offset = params.offset()?;
    let vs = state.terminology.search(params.query(), limit, offset);
    let body = serde_json::to_value(&vs)
        .map_err(|e| Error::Internal(format!("serialize ValueSet: {}", e)))?;
    Ok(fhir_response(StatusCode::OK, body))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub system: Option<String>,
    pub code: Option<String>,
}

/// GET /fhir/CodeSystem/$lookup
pub async fn lookup(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Response> {
    let system = required("system", params.system.as_deref())?;
    let code = required("code", params.code.as_deref())?;
    let parameters = state.terminology.lookup(system, code)?;
    Ok(fhir_response(StatusCode::OK, parameters.to_value()))
}

/// GET /fhir/CodeSystem/:id
pub async fn read_code_system(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let resource = state.terminology.read(&id).await?;
    Ok(fhir_response(StatusCode::OK, resource))
}

#[derive(Debug, Deserialize)]
pub struct VersionsParams {
    pub url: Option<String>,
}

/// GET /fhir/CodeSystem?url=
pub async fn code_system_versions(
    State(state): State<AppState>,
    Query(params): Query<VersionsParams>,
) -> Result<Response> {
    let url = required("url", params.url.as_deref())?;
    let bundle = state.terminology.versions(url).await?;
    Ok(fhir_response(StatusCode::OK, bundle.to_value()?))
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidRequest(format!("query parameter '{}' is required", name)))
}
