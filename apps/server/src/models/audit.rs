use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// An audit log row
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: Uuid,
    /// `ingest`, `bundle-upload`
    pub action: String,
    /// `success` or `failure`
    pub outcome: String,
    pub request_id: Option<String>,
    /// Canonical URL or CodeSystem id the action touched
    pub target: Option<String>,
    pub details: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            outcome: if success { "success" } else { "failure" }.to_string(),
            request_id: None,
            target: None,
            details: JsonValue::Object(Default::default()),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}
