//! Clinical entries carried in uploaded bundles

use medisync_models::Coding;
use serde_json::Value;

/// One clinical record, read from a `Condition`-shaped bundle resource
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClinicalEntry {
    pub resource_type: String,
    /// Resource id, when the submitter supplied a non-empty one
    pub id: Option<String>,
    /// `subject.reference`
    pub subject: Option<String>,
    /// `code.coding[]` in submission order
    pub codings: Vec<Coding>,
    /// `clinicalStatus.coding[0].code`
    pub clinical_status: Option<String>,
    /// `verificationStatus.coding[0].code`
    pub verification_status: Option<String>,
    /// `onsetDateTime`, falling back to `recordedDate`
    pub timestamp: Option<String>,
}

impl ClinicalEntry {
    /// Read an entry from a bundle `entry` element.
    ///
    /// Returns `None` unless the element is an object carrying a `resource`
    /// object. Everything below that is optional here and judged by the
    /// validator.
    pub fn from_bundle_entry(entry: &Value) -> Option<Self> {
        let resource = entry.as_object()?.get("resource")?.as_object()?;

        let codings = resource
            .get("code")
            .and_then(|c| c.get("coding"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(read_coding).collect())
            .unwrap_or_default();

        Some(Self {
            resource_type: non_empty(resource.get("resourceType"))
                .unwrap_or_else(|| "Condition".to_string()),
            id: non_empty(resource.get("id")),
            subject: non_empty(resource.get("subject").and_then(|s| s.get("reference"))),
            codings,
            clinical_status: first_code(resource.get("clinicalStatus")),
            verification_status: first_code(resource.get("verificationStatus")),
            timestamp: non_empty(resource.get("onsetDateTime"))
                .or_else(|| non_empty(resource.get("recordedDate"))),
        })
    }
}

/// True when `entry` could become a [`ClinicalEntry`]
pub fn is_processable(entry: &Value) -> bool {
    entry
        .get("resource")
        .map(Value::is_object)
        .unwrap_or(false)
}

fn read_coding(value: &Value) -> Coding {
    Coding {
        system: non_empty(value.get("system")),
        version: non_empty(value.get("version")),
        code: non_empty(value.get("code")),
        display: non_empty(value.get("display")),
    }
}

fn first_code(concept: Option<&Value>) -> Option<String> {
    concept
        .and_then(|c| c.get("coding"))
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|coding| non_empty(coding.get("code")))
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
