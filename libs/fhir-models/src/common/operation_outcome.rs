//! FHIR OperationOutcome model

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A collection of error, warning, or information messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(default)]
    pub issue: Vec<OperationOutcomeIssue>,
}

fn default_resource_type() -> String {
    "OperationOutcome".to_string()
}

/// Severity of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Fatal => "fatal",
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Information => "information",
        }
    }
}

/// Subset of the FHIR issue-type value set used by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Structure,
    Required,
    Value,
    CodeInvalid,
    NotFound,
    NotSupported,
    Duplicate,
    Processing,
    Informational,
    Timeout,
    Transient,
    Exception,
}

/// A single issue associated with the action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcomeIssue {
    pub severity: IssueSeverity,

    pub code: IssueType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

/// Free-text details of an issue (`CodeableConcept.text`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub text: String,
}

impl OperationOutcomeIssue {
    pub fn new(severity: IssueSeverity, code: IssueType) -> Self {
        Self {
            severity,
            code,
            details: None,
            diagnostics: None,
            expression: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }

    pub fn with_details(mut self, text: impl Into<String>) -> Self {
        self.details = Some(IssueDetails { text: text.into() });
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression.push(expression.into());
        self
    }
}

impl Default for OperationOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationOutcome {
    pub fn new() -> Self {
        Self {
            resource_type: default_resource_type(),
            issue: Vec::new(),
        }
    }

    /// Outcome carrying a single issue
    pub fn single(
        severity: IssueSeverity,
        code: IssueType,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self {
            issue: vec![OperationOutcomeIssue::new(severity, code).with_diagnostics(diagnostics)],
            ..Self::new()
        }
    }

    pub fn push(&mut self, issue: OperationOutcomeIssue) {
        self.issue.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issue.is_empty()
    }

    /// Number of issues at the given severity
    pub fn count(&self, severity: IssueSeverity) -> usize {
        self.issue.iter().filter(|i| i.severity == severity).count()
    }

    /// True when any issue is `fatal` or `error`
    pub fn has_errors(&self) -> bool {
        self.issue
            .iter()
            .any(|i| matches!(i.severity, IssueSeverity::Fatal | IssueSeverity::Error))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
