//! FHIR CodeSystem model
//!
//! Version-agnostic model for CodeSystems (terminology)

use super::complex::*;
use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FHIR CodeSystem resource
///
/// Declares the existence of and describes a code system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystem {
    /// Resource type - always "CodeSystem"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical identifier
    pub url: String,

    /// Business version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Name (computer friendly)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Name (human friendly)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Publication status
    pub status: PublicationStatus,

    /// Date last changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Name of the publisher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// If code comparison is case sensitive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    /// Content type (not-present | example | fragment | complete | supplement)
    pub content: CodeSystemContentMode,

    /// Total concepts in the code system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Concepts in the code system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept: Option<Vec<CodeSystemConcept>>,

    /// Additional content
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "CodeSystem".to_string()
}

/// Content mode for a code system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeSystemContentMode {
    NotPresent,
    Example,
    Fragment,
    Complete,
    Supplement,
}

/// Concept in the code system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeSystemConcept {
    /// Code that identifies the concept
    pub code: String,

    /// Text to display to the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Formal definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    /// Additional representations for the concept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<Vec<ConceptDesignation>>,
}

impl CodeSystem {
    /// Create a new CodeSystem with minimal required fields
    pub fn new(
        url: impl Into<String>,
        status: PublicationStatus,
        content: CodeSystemContentMode,
    ) -> Self {
        Self {
            resource_type: "CodeSystem".to_string(),
            id: None,
            url: url.into(),
            version: None,
            name: None,
            title: None,
            status,
            date: None,
            publisher: None,
            description: None,
            case_sensitive: None,
            content,
            count: None,
            concept: None,
            extensions: HashMap::new(),
        }
    }

    /// Parse from JSON Value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(Error::from)
    }

    /// Convert to JSON Value
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// Concepts as a slice
    pub fn concepts(&self) -> &[CodeSystemConcept] {
        self.concept.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_code_system() {
        let json = json!({
            "resourceType": "CodeSystem",
            "id": "namaste",
            "url": "http://terminology.india.gov.in/namaste",
            "version": "2",
            "status": "active",
            "content": "complete",
            "count": 1,
            "concept": [{
                "code": "NAM001",
                "display": "Vataja Jvara",
                "designation": [{"value": "vata fever"}]
            }]
        });

        let cs: CodeSystem = serde_json::from_value(json).unwrap();
        assert_eq!(cs.version.as_deref(), Some("2"));
        assert_eq!(cs.content, CodeSystemContentMode::Complete);
        assert_eq!(cs.concepts().len(), 1);
        assert_eq!(
            cs.concepts()[0].designation.as_ref().unwrap()[0].value,
            "vata fever"
        );
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let cs = CodeSystem::new(
            "http://example.org/cs",
            PublicationStatus::Active,
            CodeSystemContentMode::Complete,
        );
        let json = cs.to_value().unwrap();
        assert_eq!(json["resourceType"], "CodeSystem");
        assert_eq!(json["content"], "complete");
        assert!(json.get("concept").is_none());
        assert!(json.get("count").is_none());
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let json = json!({
            "url": "http://example.org/cs",
            "status": "draft",
            "content": "fragment",
            "outcome": {"resourceType": "OperationOutcome", "issue": []}
        });

        let cs = CodeSystem::from_value(&json).unwrap();
        assert_eq!(cs.resource_type, "CodeSystem");
        assert!(cs.extensions.contains_key("outcome"));
    }
}
