//! Error types for the terminology core
//!
//! Row- and entry-level problems are data (`RowError`, `ValidationIssue`) and
//! never appear here; these enums cover the batch-fatal cases only.

use thiserror::Error;

/// Failure to assemble a CodeSystem snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("no valid entries to build a code system from")]
    EmptyInput,

    #[error("canonical url is not an absolute URI: {0}")]
    InvalidUrl(String),

    #[error("code system name must not be empty")]
    MissingName,

    #[error("stored code system is not usable: {0}")]
    InvalidResource(String),
}

/// Batch-fatal ingestion failure
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("required column missing from header: {0}")]
    MissingColumn(&'static str),

    #[error("unreadable tabular input: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// The uploaded payload is not a bundle this service can process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {detail}")]
pub struct FatalMalformation {
    /// Machine reason code (`not_a_bundle`, `unsupported_bundle_type`, ...)
    pub reason: &'static str,
    pub detail: String,
}

impl FatalMalformation {
    pub fn new(reason: &'static str, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Failure writing an accepted entry through to persistence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entry sink failed: {0}")]
pub struct SinkError(pub String);

/// Bundle processing failures that surface at the transport level
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Malformed(#[from] FatalMalformation),

    #[error("persisting entry {index} failed: {source}")]
    Persistence {
        index: usize,
        #[source]
        source: SinkError,
    },
}
