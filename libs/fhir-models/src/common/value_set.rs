//! FHIR ValueSet model
//!
//! Only the expansion side of ValueSet is modelled; search results are
//! returned as an expanded ValueSet.

use super::complex::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// FHIR ValueSet resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueSet {
    /// Resource type - always "ValueSet"
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Logical id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Canonical identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name (computer friendly)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Publication status
    pub status: PublicationStatus,

    /// Used when the value set is "expanded"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expansion: Option<ValueSetExpansion>,

    /// Additional content
    #[serde(flatten)]
    pub extensions: HashMap<String, Value>,
}

fn default_resource_type() -> String {
    "ValueSet".to_string()
}

/// Expansion of the value set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetExpansion {
    /// Uniquely identifies this expansion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Time valueset expansion was generated
    pub timestamp: String,

    /// Total number of codes in the expansion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    /// Offset at which this resource starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,

    /// Parameters used for expansion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Vec<Value>>,

    /// Codes in the value set
    #[serde(default)]
    pub contains: Vec<ValueSetExpansionContains>,
}

/// Codes in an expansion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetExpansionContains {
    /// System value for the code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Version in which this code/display is defined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Code - if blank, this is not a selectable code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// User display for the concept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ValueSet {
    /// Create a new ValueSet with minimal required fields
    pub fn new(status: PublicationStatus) -> Self {
        Self {
            resource_type: "ValueSet".to_string(),
            id: None,
            url: None,
            name: None,
            status,
            expansion: None,
            extensions: HashMap::new(),
        }
    }

    /// Codes contained in the expansion, if expanded
    pub fn contains(&self) -> &[ValueSetExpansionContains] {
        self.expansion
            .as_ref()
            .map(|e| e.contains.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_expansion() {
        let mut vs = ValueSet::new(PublicationStatus::Active);
        vs.expansion = Some(ValueSetExpansion {
            identifier: Some("urn:uuid:1".to_string()),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            total: Some(7),
            offset: Some(5),
            parameter: None,
            contains: vec![ValueSetExpansionContains {
                system: Some("http://example.org/cs".to_string()),
                version: None,
                code: Some("A1".to_string()),
                display: Some("Alpha".to_string()),
            }],
        });

        let json = serde_json::to_value(&vs).unwrap();
        assert_eq!(json["resourceType"], "ValueSet");
        assert_eq!(json["expansion"]["total"], 7);
        assert_eq!(json["expansion"]["offset"], 5);
        assert_eq!(json["expansion"]["contains"][0]["code"], "A1");
        assert!(json["expansion"]["contains"][0].get("version").is_none());
    }

    #[test]
    fn test_contains_defaults_to_empty() {
        let vs: ValueSet = serde_json::from_value(json!({
            "resourceType": "ValueSet",
            "status": "active",
            "expansion": {"timestamp": "2024-01-01T00:00:00Z", "total": 0}
        }))
        .unwrap();
        assert!(vs.contains().is_empty());
    }
}
