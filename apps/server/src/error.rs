//! Error types for the MediSync server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use medisync_models::{IssueSeverity, IssueType, OperationOutcome};
use medisync_terminology::{BuildError, FatalMalformation, IngestError, ProcessError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Model error: {0}")]
    Model(#[from] medisync_models::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestError),

    #[error("Malformed bundle: {0}")]
    Malformed(#[from] FatalMalformation),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ProcessError> for Error {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Malformed(m) => Error::Malformed(m),
            ProcessError::Persistence { index, source } => Error::Unavailable(format!(
                "could not persist entry {}: {}",
                index, source
            )),
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) | Error::Malformed(_) => StatusCode::BAD_REQUEST,
            Error::Ingestion(e) => match e {
                IngestError::MissingColumn(_) | IngestError::Build(BuildError::EmptyInput) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                IngestError::Csv(_) | IngestError::Build(_) => StatusCode::BAD_REQUEST,
            },
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(_)
            | Error::Migration(_)
            | Error::Model(_)
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The OperationOutcome body for this error
    pub fn to_outcome(&self) -> OperationOutcome {
        let status = self.status();
        match self {
            Error::Malformed(m) => m.to_outcome(),
            _ if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => {
                OperationOutcome::single(
                    IssueSeverity::Error,
                    IssueType::Exception,
                    "Internal server error",
                )
            }
            _ => OperationOutcome::single(
                IssueSeverity::Error,
                status_to_issue_type(status),
                self.to_string(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        } else if status.is_server_error() {
            tracing::warn!(error = %self, "request could not be served");
        }

        let mut response = (status, Json(self.to_outcome().to_value())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/fhir+json; charset=utf-8"),
        );
        response
    }
}

fn status_to_issue_type(status: StatusCode) -> IssueType {
    match status {
        StatusCode::BAD_REQUEST => IssueType::Invalid,
        StatusCode::NOT_FOUND => IssueType::NotFound,
        StatusCode::UNPROCESSABLE_ENTITY => IssueType::Processing,
        StatusCode::SERVICE_UNAVAILABLE => IssueType::Transient,
        _ => IssueType::Exception,
    }
}
