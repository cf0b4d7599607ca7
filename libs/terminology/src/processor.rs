//! Bundle Transaction Processor
//!
//! Validates every entry of an uploaded bundle independently and answers
//! with one response entry per input entry, in input order. Only a bundle
//! whose top-level shape is unusable fails as a whole.

use crate::clinical::is_processable;
use crate::error::{FatalMalformation, ProcessError, SinkError};
use crate::validator::{EntryValidator, TransactionOutcome, Verdict};
use async_trait::async_trait;
use medisync_models::{
    Bundle, BundleEntry, BundleEntryResponse, BundleType, Extension, IssueSeverity, IssueType,
    OperationOutcome,
};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Base URL of the summary extensions on response bundles
pub const SUMMARY_EXTENSION_BASE: &str =
    "http://medisync.local/fhir/StructureDefinition/bundle-summary";

const ACCEPTED_BUNDLE_TYPES: &[BundleType] = &[
    BundleType::Collection,
    BundleType::Batch,
    BundleType::Transaction,
];

/// Write-through for accepted entries
#[async_trait]
pub trait EntrySink: Send + Sync {
    async fn persist(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> Result<(), SinkError>;
}

/// Sink that keeps nothing; used for offline validation
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl EntrySink for DiscardSink {
    async fn persist(
        &self,
        _resource_type: &str,
        _id: &str,
        _resource: &Value,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Per-request counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub warnings: usize,
}

/// One response record, parallel to an input entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryResult {
    pub full_url: Option<String>,
    pub outcome: TransactionOutcome,
}

impl EntryResult {
    /// `201 Created`, `400 Bad Request` or `503 Service Unavailable`
    pub fn status_line(&self) -> &'static str {
        match self.outcome.reason() {
            None => "201 Created",
            Some("resolver_unreachable") | Some("deferred_timeout") => "503 Service Unavailable",
            Some(_) => "400 Bad Request",
        }
    }

    fn to_fhir(&self) -> BundleEntry {
        let location = match &self.outcome.verdict {
            Verdict::Accepted { id } => Some(format!("{}/{}", self.outcome.resource_type, id)),
            Verdict::Rejected { .. } => None,
        };
        BundleEntry {
            full_url: self.full_url.clone(),
            response: Some(BundleEntryResponse {
                location,
                outcome: self.outcome.outcome(),
                ..BundleEntryResponse::new(self.status_line())
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedBundle {
    pub entries: Vec<EntryResult>,
    pub summary: ProcessSummary,
}

impl ProcessedBundle {
    /// Render as a `batch-response` Bundle with summary extensions
    pub fn to_fhir(&self) -> Bundle {
        let mut bundle = Bundle::new(BundleType::BatchResponse);
        bundle.id = Some(uuid::Uuid::new_v4().to_string());
        bundle.timestamp = Some(chrono::Utc::now().to_rfc3339());
        for entry in &self.entries {
            bundle.add_entry(entry.to_fhir());
        }
        if bundle.entry.is_none() {
            bundle.entry = Some(Vec::new());
        }

        let counts = [
            ("total", self.summary.total),
            ("accepted", self.summary.accepted),
            ("rejected", self.summary.rejected),
            ("warnings", self.summary.warnings),
        ];
        for (name, value) in counts {
            bundle.add_extension(Extension::integer(
                format!("{}-{}", SUMMARY_EXTENSION_BASE, name),
                value as i64,
            ));
        }
        bundle
    }
}

impl FatalMalformation {
    /// Single `fatal` issue naming the malformation
    pub fn to_outcome(&self) -> OperationOutcome {
        let mut outcome =
            OperationOutcome::single(IssueSeverity::Fatal, IssueType::Structure, self.reason);
        if let Some(issue) = outcome.issue.first_mut() {
            issue.details = Some(medisync_models::IssueDetails {
                text: self.detail.clone(),
            });
        }
        outcome
    }
}

/// Check the top-level shape and return the entry list
pub fn bundle_entries(bundle: &Value) -> Result<&[Value], FatalMalformation> {
    let Some(object) = bundle.as_object() else {
        return Err(FatalMalformation::new("not_a_bundle", "payload is not a JSON object"));
    };
    if object.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Err(FatalMalformation::new(
            "not_a_bundle",
            "resourceType must be 'Bundle'",
        ));
    }
    if let Some(bundle_type) = object.get("type") {
        match bundle_type.as_str().and_then(BundleType::parse) {
            Some(t) if ACCEPTED_BUNDLE_TYPES.contains(&t) => {}
            _ => {
                let accepted: Vec<&str> = ACCEPTED_BUNDLE_TYPES.iter().map(|t| t.as_str()).collect();
                return Err(FatalMalformation::new(
                    "unsupported_bundle_type",
                    format!(
                        "Bundle.type must be one of {}, got {}",
                        accepted.join(", "),
                        bundle_type
                    ),
                ));
            }
        }
    }
    let entries = match object.get("entry") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(FatalMalformation::new(
                "entry_not_array",
                "Bundle.entry must be an array",
            ))
        }
    };
    if !entries.is_empty() && !entries.iter().any(is_processable) {
        return Err(FatalMalformation::new(
            "no_processable_entries",
            "no Bundle.entry element carries a resource object",
        ));
    }
    Ok(entries)
}

#[derive(Debug, Clone)]
pub struct BundleProcessor {
    validator: EntryValidator,
    timeout: Option<Duration>,
}

impl BundleProcessor {
    pub fn new(validator: EntryValidator) -> Self {
        Self {
            validator,
            timeout: None,
        }
    }

    /// Overall deadline for one `process` call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate and persist every entry.
    ///
    /// Entries are judged one after another; each accepted entry goes to
    /// `sink` right after its own validation. The deadline is checked before
    /// each entry and bounds each validation. A write already handed to the
    /// sink is allowed to finish. Once the deadline passes, the entry in
    /// flight and all later ones are reported as `deferred_timeout`.
    pub async fn process(
        &self,
        bundle: &Value,
        sink: &dyn EntrySink,
    ) -> Result<ProcessedBundle, ProcessError> {
        let entries = bundle_entries(bundle)?;
        let deadline = self.timeout.map(|t| Instant::now() + t);

        let mut results = Vec::with_capacity(entries.len());
        let mut timed_out = false;

        for (index, entry) in entries.iter().enumerate() {
            let full_url = entry
                .get("fullUrl")
                .and_then(Value::as_str)
                .map(str::to_string);

            let outcome = if timed_out {
                deferred(entry)
            } else {
                match self.validate_before(entry, deadline).await {
                    Some(outcome) => outcome,
                    None => {
                        tracing::warn!(
                            index,
                            "bundle deadline passed, deferring remaining entries"
                        );
                        timed_out = true;
                        deferred(entry)
                    }
                }
            };

            if let Verdict::Accepted { id } = &outcome.verdict {
                let mut resource = entry.get("resource").cloned().unwrap_or(Value::Null);
                if let Some(object) = resource.as_object_mut() {
                    object.insert("id".to_string(), Value::String(id.clone()));
                }
                sink.persist(&outcome.resource_type, id, &resource)
                    .await
                    .map_err(|source| ProcessError::Persistence { index, source })?;
            }

            tracing::debug!(
                index,
                accepted = outcome.is_accepted(),
                reason = outcome.reason().unwrap_or(""),
                "bundle entry processed"
            );
            results.push(EntryResult { full_url, outcome });
        }

        let summary = summarize(&results);
        tracing::info!(
            total = summary.total,
            accepted = summary.accepted,
            rejected = summary.rejected,
            warnings = summary.warnings,
            "bundle processed"
        );
        Ok(ProcessedBundle {
            entries: results,
            summary,
        })
    }

    /// `None` when the deadline has passed or passes during validation
    async fn validate_before(
        &self,
        entry: &Value,
        deadline: Option<Instant>,
    ) -> Option<TransactionOutcome> {
        let Some(deadline) = deadline else {
            return Some(self.validator.validate(entry).await);
        };
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::timeout_at(deadline, self.validator.validate(entry))
            .await
            .ok()
    }
}

fn deferred(entry: &Value) -> TransactionOutcome {
    let resource_type = entry
        .get("resource")
        .and_then(|r| r.get("resourceType"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    TransactionOutcome::deferred(resource_type)
}

fn summarize(results: &[EntryResult]) -> ProcessSummary {
    let accepted = results.iter().filter(|r| r.outcome.is_accepted()).count();
    ProcessSummary {
        total: results.len(),
        accepted,
        rejected: results.len() - accepted,
        warnings: results.iter().map(|r| r.outcome.warning_count()).sum(),
    }
}
