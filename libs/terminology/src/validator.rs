//! Bundle Entry Validator
//!
//! Judges one clinical entry. Hard structural checks run first and stop at
//! the first failure; advisory checks then collect warnings (or, in strict
//! mode, reject when the classification side is missing or unknown).

use crate::clinical::ClinicalEntry;
use crate::resolver::{CodeResolver, Resolution};
use crate::text::normalize_phrase;
use medisync_models::{Coding, IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Classification systems recognised when none are configured
pub const DEFAULT_CLASSIFICATION_SYSTEMS: &[&str] = &[
    "http://id.who.int/icd11/mms",
    "http://id.who.int/icd/release/11/mms",
];

const CLINICAL_STATUS_CODES: &[&str] = &[
    "active",
    "recurrence",
    "relapse",
    "inactive",
    "remission",
    "resolved",
    "unknown",
];

const VERIFICATION_STATUS_CODES: &[&str] = &[
    "unconfirmed",
    "provisional",
    "differential",
    "confirmed",
    "refuted",
    "entered-in-error",
];

/// Policy for entries whose classification coding is missing or unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Record a warning and accept
    #[default]
    Advisory,
    /// Reject with an error
    Strict,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Advisory => write!(f, "advisory"),
            ValidationMode::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advisory" => Ok(ValidationMode::Advisory),
            "strict" => Ok(ValidationMode::Strict),
            other => Err(format!("unknown validation mode '{}'", other)),
        }
    }
}

/// One finding about an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Machine reason code, e.g. `missing_subject`
    pub reason: &'static str,
    pub detail: String,
    /// FHIRPath-ish location of the problem
    pub expression: Option<&'static str>,
}

impl ValidationIssue {
    pub fn error(reason: &'static str, detail: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, reason, detail)
    }

    pub fn warning(reason: &'static str, detail: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Warning, reason, detail)
    }

    fn new(severity: IssueSeverity, reason: &'static str, detail: impl Into<String>) -> Self {
        Self {
            severity,
            reason,
            detail: detail.into(),
            expression: None,
        }
    }

    fn at(mut self, expression: &'static str) -> Self {
        self.expression = Some(expression);
        self
    }

    pub fn to_fhir(&self) -> OperationOutcomeIssue {
        let mut issue = OperationOutcomeIssue::new(self.severity, issue_type(self.reason))
            .with_diagnostics(self.reason)
            .with_details(self.detail.clone());
        if let Some(expression) = self.expression {
            issue = issue.with_expression(expression);
        }
        issue
    }
}

fn issue_type(reason: &str) -> IssueType {
    match reason {
        "malformed_entry" => IssueType::Structure,
        "missing_subject" | "missing_coding" | "missing_local_coding"
        | "missing_classification_coding" => IssueType::Required,
        "invalid_coding" | "display_mismatch" | "invalid_timestamp" => IssueType::Value,
        "unresolvable_local_code"
        | "unresolvable_classification_code"
        | "unknown_clinical_status"
        | "unknown_verification_status" => IssueType::CodeInvalid,
        "resolver_unreachable" | "classification_authority_unreachable" => IssueType::Transient,
        "deferred_timeout" => IssueType::Timeout,
        _ => IssueType::Processing,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { id: String },
    Rejected { severity: IssueSeverity, reason: &'static str },
}

/// Verdict for one entry plus every issue found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub resource_type: String,
    pub verdict: Verdict,
    pub issues: Vec<ValidationIssue>,
}

impl TransactionOutcome {
    fn rejected(resource_type: impl Into<String>, issue: ValidationIssue) -> Self {
        Self {
            resource_type: resource_type.into(),
            verdict: Verdict::Rejected {
                severity: issue.severity,
                reason: issue.reason,
            },
            issues: vec![issue],
        }
    }

    /// An entry the deadline passed before it could be judged
    pub fn deferred(resource_type: impl Into<String>) -> Self {
        Self::rejected(
            resource_type,
            ValidationIssue::warning(
                "deferred_timeout",
                "processing deadline passed before this entry was validated",
            ),
        )
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted { .. })
    }

    /// Rejection reason, if rejected
    pub fn reason(&self) -> Option<&'static str> {
        match self.verdict {
            Verdict::Rejected { reason, .. } => Some(reason),
            Verdict::Accepted { .. } => None,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    /// Issues as an OperationOutcome, `None` when there are none
    pub fn outcome(&self) -> Option<OperationOutcome> {
        if self.issues.is_empty() {
            return None;
        }
        let mut outcome = OperationOutcome::new();
        for issue in &self.issues {
            outcome.push(issue.to_fhir());
        }
        Some(outcome)
    }
}

/// Validates entries against a local resolver and, optionally, a
/// classification authority
#[derive(Clone)]
pub struct EntryValidator {
    local: Arc<dyn CodeResolver>,
    classification: Option<Arc<dyn CodeResolver>>,
    classification_systems: Vec<String>,
    mode: ValidationMode,
}

impl fmt::Debug for EntryValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryValidator")
            .field("classification_systems", &self.classification_systems)
            .field("classification_authority", &self.classification.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

impl EntryValidator {
    pub fn new(local: Arc<dyn CodeResolver>) -> Self {
        Self {
            local,
            classification: None,
            classification_systems: DEFAULT_CLASSIFICATION_SYSTEMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mode: ValidationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_classification_systems<I, S>(mut self, systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classification_systems = systems.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_classification_resolver(mut self, resolver: Arc<dyn CodeResolver>) -> Self {
        self.classification = Some(resolver);
        self
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    fn is_classification(&self, coding: &Coding) -> bool {
        coding
            .system
            .as_deref()
            .map(|s| self.classification_systems.iter().any(|c| c == s))
            .unwrap_or(false)
    }

    /// Judge one bundle `entry` element
    pub async fn validate(&self, entry: &Value) -> TransactionOutcome {
        let Some(clinical) = ClinicalEntry::from_bundle_entry(entry) else {
            return TransactionOutcome::rejected(
                "Unknown",
                ValidationIssue::error(
                    "malformed_entry",
                    "bundle entry must be an object carrying a resource object",
                )
                .at("Bundle.entry"),
            );
        };
        self.validate_entry(&clinical).await
    }

    /// Judge an already parsed entry
    pub async fn validate_entry(&self, entry: &ClinicalEntry) -> TransactionOutcome {
        let resource_type = entry.resource_type.clone();
        let reject =
            |issue: ValidationIssue| TransactionOutcome::rejected(resource_type.clone(), issue);

        if entry.subject.is_none() {
            return reject(
                ValidationIssue::error("missing_subject", "subject.reference is required")
                    .at("Condition.subject"),
            );
        }

        if entry.codings.is_empty() {
            return reject(
                ValidationIssue::error(
                    "missing_coding",
                    "code.coding must contain at least one coding",
                )
                .at("Condition.code.coding"),
            );
        }

        for (i, coding) in entry.codings.iter().enumerate() {
            if let Some(detail) = coding_problem(coding) {
                return reject(
                    ValidationIssue::error("invalid_coding", format!("coding[{}]: {}", i, detail))
                        .at("Condition.code.coding"),
                );
            }
        }

        let Some(local) = entry.codings.iter().find(|c| !self.is_classification(c)) else {
            return reject(
                ValidationIssue::error(
                    "missing_local_coding",
                    "no coding from a local code system is present",
                )
                .at("Condition.code.coding"),
            );
        };
        // coding_problem guarantees both are present
        let local_system = local.system.as_deref().unwrap_or_default();
        let local_code = local.code.as_deref().unwrap_or_default();

        let resolved = match self.local.resolve(local_system, local_code).await {
            Resolution::Found(found) => found,
            Resolution::NotFound => {
                return reject(
                    ValidationIssue::error(
                        "unresolvable_local_code",
                        format!("code '{}' is not defined in {}", local_code, local_system),
                    )
                    .at("Condition.code.coding"),
                );
            }
            Resolution::Unreachable(why) => {
                return reject(
                    ValidationIssue::error(
                        "resolver_unreachable",
                        format!("could not resolve {}|{}: {}", local_system, local_code, why),
                    )
                    .at("Condition.code.coding"),
                );
            }
        };

        let mut issues = Vec::new();
        self.check_classification(entry, &mut issues).await;

        if let Some(display) = local.display.as_deref() {
            if normalize_phrase(display) != normalize_phrase(&resolved.display) {
                issues.push(
                    ValidationIssue::warning(
                        "display_mismatch",
                        format!(
                            "display '{}' differs from '{}' for code {}",
                            display, resolved.display, resolved.code
                        ),
                    )
                    .at("Condition.code.coding.display"),
                );
            }
        }

        if let Some(status) = entry.clinical_status.as_deref() {
            if !CLINICAL_STATUS_CODES.contains(&status) {
                issues.push(
                    ValidationIssue::warning(
                        "unknown_clinical_status",
                        format!("clinical status '{}' is not recognised", status),
                    )
                    .at("Condition.clinicalStatus"),
                );
            }
        }

        if let Some(status) = entry.verification_status.as_deref() {
            if !VERIFICATION_STATUS_CODES.contains(&status) {
                issues.push(
                    ValidationIssue::warning(
                        "unknown_verification_status",
                        format!("verification status '{}' is not recognised", status),
                    )
                    .at("Condition.verificationStatus"),
                );
            }
        }

        if let Some(timestamp) = entry.timestamp.as_deref() {
            if !is_fhir_date_time(timestamp) {
                issues.push(
                    ValidationIssue::warning(
                        "invalid_timestamp",
                        format!("'{}' is not a valid date or dateTime", timestamp),
                    )
                    .at("Condition.onsetDateTime"),
                );
            }
        }

        if let Some(blocking) = issues.iter().find(|i| i.severity == IssueSeverity::Error) {
            return TransactionOutcome {
                resource_type,
                verdict: Verdict::Rejected {
                    severity: blocking.severity,
                    reason: blocking.reason,
                },
                issues,
            };
        }

        let id = entry
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        TransactionOutcome {
            resource_type,
            verdict: Verdict::Accepted { id },
            issues,
        }
    }

    async fn check_classification(&self, entry: &ClinicalEntry, issues: &mut Vec<ValidationIssue>) {
        let strict_severity = match self.mode {
            ValidationMode::Advisory => IssueSeverity::Warning,
            ValidationMode::Strict => IssueSeverity::Error,
        };

        let Some(coding) = entry.codings.iter().find(|c| self.is_classification(c)) else {
            issues.push(
                ValidationIssue::new(
                    strict_severity,
                    "missing_classification_coding",
                    "entry carries no international classification coding",
                )
                .at("Condition.code.coding"),
            );
            return;
        };

        let Some(authority) = &self.classification else {
            return;
        };
        let system = coding.system.as_deref().unwrap_or_default();
        let code = coding.code.as_deref().unwrap_or_default();

        match authority.resolve(system, code).await {
            Resolution::Found(_) => {}
            Resolution::NotFound => issues.push(
                ValidationIssue::new(
                    strict_severity,
                    "unresolvable_classification_code",
                    format!("classification code '{}' is unknown to the authority", code),
                )
                .at("Condition.code.coding"),
            ),
            Resolution::Unreachable(why) => {
                tracing::warn!(code = %code, reason = %why, "classification authority unreachable");
                issues.push(
                    ValidationIssue::warning(
                        "classification_authority_unreachable",
                        format!("classification code '{}' could not be checked: {}", code, why),
                    )
                    .at("Condition.code.coding"),
                );
            }
        }
    }
}

fn coding_problem(coding: &Coding) -> Option<String> {
    let Some(system) = coding.system.as_deref() else {
        return Some("system is missing".to_string());
    };
    if coding.code.is_none() {
        return Some("code is missing".to_string());
    }
    if url::Url::parse(system).is_err() {
        return Some(format!("system '{}' is not an absolute URI", system));
    }
    None
}

/// FHIR `date` / `dateTime`: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, or a full
/// timestamp with or without offset.
fn is_fhir_date_time(value: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    if DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
    {
        return true;
    }
    let parts: Vec<&str> = value.split('-').collect();
    match parts.as_slice() {
        [year] => year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()),
        [year, month] => {
            year.len() == 4
                && year.chars().all(|c| c.is_ascii_digit())
                && matches!(month.parse::<u32>(), Ok(1..=12))
                && month.len() == 2
        }
        _ => false,
    }
}
