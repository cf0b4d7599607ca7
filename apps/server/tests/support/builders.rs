use super::fixtures::constants::{ICD11_SYSTEM, NAMASTE_SYSTEM};
use serde_json::{json, Value};

/// Builder for Condition bundle entries
#[derive(Debug, Clone)]
pub struct ConditionBuilder {
    id: Option<String>,
    subject: Option<String>,
    codings: Vec<Value>,
    clinical_status: Option<String>,
    onset: Option<String>,
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            subject: Some("Patient/example".to_string()),
            codings: Vec::new(),
            clinical_status: None,
            onset: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn no_subject(mut self) -> Self {
        self.subject = None;
        self
    }

    pub fn coding(mut self, system: &str, code: &str) -> Self {
        self.codings.push(json!({"system": system, "code": code}));
        self
    }

    pub fn coding_with_display(mut self, system: &str, code: &str, display: &str) -> Self {
        self.codings
            .push(json!({"system": system, "code": code, "display": display}));
        self
    }

    /// Local NAMASTE code paired with an ICD-11 code
    pub fn dual(self, local_code: &str, icd_code: &str) -> Self {
        self.coding(NAMASTE_SYSTEM, local_code)
            .coding(ICD11_SYSTEM, icd_code)
    }

    pub fn clinical_status(mut self, code: &str) -> Self {
        self.clinical_status = Some(code.to_string());
        self
    }

    pub fn onset(mut self, value: &str) -> Self {
        self.onset = Some(value.to_string());
        self
    }

    pub fn build(self) -> Value {
        let mut resource = json!({
            "resourceType": "Condition",
            "code": {"coding": self.codings},
        });
        if let Some(id) = &self.id {
            resource["id"] = json!(id);
        }
        if let Some(subject) = self.subject {
            resource["subject"] = json!({"reference": subject});
        }
        if let Some(status) = self.clinical_status {
            resource["clinicalStatus"] = json!({"coding": [{"code": status}]});
        }
        if let Some(onset) = self.onset {
            resource["onsetDateTime"] = json!(onset);
        }
        resource
    }

    /// Wrap as a bundle entry
    pub fn entry(self) -> Value {
        let full_url = self.id.as_ref().map(|id| format!("urn:uuid:{id}"));
        let mut entry = json!({"resource": self.build()});
        if let Some(full_url) = full_url {
            entry["fullUrl"] = json!(full_url);
        }
        entry
    }
}

/// Builder for uploaded bundles
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    bundle_type: String,
    entries: Vec<Value>,
}

impl BundleBuilder {
    pub fn collection() -> Self {
        Self::of_type("collection")
    }

    pub fn of_type(bundle_type: &str) -> Self {
        Self {
            bundle_type: bundle_type.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn entry(mut self, entry: Value) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn condition(self, condition: ConditionBuilder) -> Self {
        self.entry(condition.entry())
    }

    pub fn build(self) -> Value {
        json!({
            "resourceType": "Bundle",
            "type": self.bundle_type,
            "entry": self.entries,
        })
    }
}
