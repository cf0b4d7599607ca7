//! Code System Builder

use crate::error::BuildError;
use crate::normalize::CodeEntry;
use medisync_models::{
    CodeSystem, CodeSystemConcept, CodeSystemContentMode, ConceptDesignation, PublicationStatus,
};
use sha2::{Digest, Sha256};

/// Immutable, versioned collection of code entries under one canonical URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSystemSnapshot {
    pub id: String,
    pub url: String,
    pub name: String,
    pub version: u32,
    entries: Vec<CodeEntry>,
}

/// Stable identifier for `(url, version)`: the first 16 bytes of
/// SHA-256 over `"{url}|{version}"`, hex encoded.
pub fn snapshot_id(url: &str, version: u32) -> String {
    let digest = Sha256::digest(format!("{}|{}", url, version).as_bytes());
    hex::encode(&digest[..16])
}

/// Assemble a snapshot. `prior_versions` is the number of snapshots already
/// published under `canonical_url`; the new one becomes `prior_versions + 1`.
pub fn build(
    name: &str,
    canonical_url: &str,
    entries: Vec<CodeEntry>,
    prior_versions: u32,
) -> Result<CodeSystemSnapshot, BuildError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BuildError::MissingName);
    }
    let canonical_url = canonical_url.trim();
    validate_url(canonical_url)?;

    if entries.is_empty() {
        return Err(BuildError::EmptyInput);
    }

    let version = prior_versions + 1;
    Ok(CodeSystemSnapshot {
        id: snapshot_id(canonical_url, version),
        url: canonical_url.to_string(),
        name: name.to_string(),
        version,
        entries,
    })
}

fn validate_url(candidate: &str) -> Result<(), BuildError> {
    match url::Url::parse(candidate) {
        Ok(parsed) if !parsed.cannot_be_a_base() || parsed.scheme() == "urn" => Ok(()),
        _ => Err(BuildError::InvalidUrl(candidate.to_string())),
    }
}

impl CodeSystemSnapshot {
    /// Number of entries; always `entries().len()`
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in ingestion order
    pub fn entries(&self) -> &[CodeEntry] {
        &self.entries
    }

    /// Render as a FHIR CodeSystem resource
    pub fn to_fhir(&self) -> CodeSystem {
        let mut cs = CodeSystem::new(
            self.url.clone(),
            PublicationStatus::Active,
            CodeSystemContentMode::Complete,
        );
        cs.id = Some(self.id.clone());
        cs.version = Some(self.version.to_string());
        cs.name = Some(self.name.clone());
        cs.title = Some(self.name.clone());
        cs.case_sensitive = Some(false);
        cs.count = Some(self.entries.len() as u32);
        cs.concept = Some(
            self.entries
                .iter()
                .map(|e| CodeSystemConcept {
                    code: e.code.clone(),
                    display: Some(e.display.clone()),
                    definition: e.definition.clone(),
                    designation: (!e.synonyms.is_empty()).then(|| {
                        e.synonyms
                            .iter()
                            .map(|s| ConceptDesignation {
                                language: None,
                                use_: None,
                                value: s.clone(),
                            })
                            .collect()
                    }),
                })
                .collect(),
        );
        cs
    }

    /// Rebuild a snapshot from a stored FHIR CodeSystem
    pub fn from_fhir(cs: &CodeSystem) -> Result<Self, BuildError> {
        let version = cs
            .version
            .as_deref()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                BuildError::InvalidResource(format!("CodeSystem {} has no numeric version", cs.url))
            })?;
        let name = cs.name.clone().unwrap_or_default();

        let entries: Vec<CodeEntry> = cs
            .concepts()
            .iter()
            .map(|c| {
                let synonyms = c
                    .designation
                    .as_deref()
                    .unwrap_or(&[])
                    .iter()
                    .map(|d| d.value.clone())
                    .collect();
                CodeEntry::new(
                    c.code.clone(),
                    c.display.clone().unwrap_or_default(),
                    cs.url.clone(),
                    c.definition.clone(),
                    synonyms,
                )
            })
            .collect();

        let mut snapshot = build(&name, &cs.url, entries, version - 1)?;
        if let Some(id) = cs.id.as_deref().filter(|id| !id.is_empty()) {
            snapshot.id = id.to_string();
        }
        Ok(snapshot)
    }
}
