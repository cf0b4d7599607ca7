use chrono::{DateTime, Utc};
use medisync_models::CodeSystem;
use medisync_terminology::{BuildError, CodeSystemSnapshot};
use serde_json::Value as JsonValue;

/// One stored CodeSystem version
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCodeSystem {
    pub id: String,
    pub url: String,
    pub name: String,
    pub version: u32,
    /// FHIR CodeSystem JSON, concepts included
    pub resource: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl StoredCodeSystem {
    pub fn from_snapshot(snapshot: &CodeSystemSnapshot) -> Result<Self, BuildError> {
        let resource = snapshot
            .to_fhir()
            .to_value()
            .map_err(|e| BuildError::InvalidResource(e.to_string()))?;
        Ok(Self {
            id: snapshot.id.clone(),
            url: snapshot.url.clone(),
            name: snapshot.name.clone(),
            version: snapshot.version,
            resource,
            created_at: Utc::now(),
        })
    }

    /// Rebuild the searchable snapshot from the stored resource
    pub fn to_snapshot(&self) -> Result<CodeSystemSnapshot, BuildError> {
        let cs = CodeSystem::from_value(&self.resource)
            .map_err(|e| BuildError::InvalidResource(e.to_string()))?;
        CodeSystemSnapshot::from_fhir(&cs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medisync_terminology::{build, CodeEntry};

    #[test]
    fn snapshot_survives_storage() {
        let url = "http://terminology.india.gov.in/namaste";
        let entries = vec![
            CodeEntry::new("NAM001", "Vataja Jvara", url, None, vec!["Vata fever".to_string()]),
            CodeEntry::new("NAM002", "Kasa", url, Some("cough".to_string()), Vec::new()),
        ];
        let snapshot = build("NAMASTE", url, entries, 2).unwrap();

        let stored = StoredCodeSystem::from_snapshot(&snapshot).unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.resource["version"], "3");

        let restored = stored.to_snapshot().unwrap();
        assert_eq!(restored.id, snapshot.id);
        assert_eq!(restored.version, 3);
        assert_eq!(restored.entries(), snapshot.entries());
    }
}
