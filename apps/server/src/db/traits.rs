//! Storage capability used by the services

use crate::models::{AuditRecord, StoredCodeSystem};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Storage backend for the terminology service
///
/// Code system versions are append-only: `insert_code_system` never replaces
/// an existing `(url, version)` pair. Callers serialize ingestion per URL, so
/// `count_versions` followed by `insert_code_system` assigns versions without
/// gaps.
#[async_trait]
pub trait TerminologyStore: Send + Sync {
    /// Number of versions stored for a canonical URL
    async fn count_versions(&self, url: &str) -> Result<u32>;

    async fn insert_code_system(&self, record: &StoredCodeSystem) -> Result<()>;

    async fn read_code_system(&self, id: &str) -> Result<Option<StoredCodeSystem>>;

    /// All versions of a canonical URL, newest first
    async fn code_system_versions(&self, url: &str) -> Result<Vec<StoredCodeSystem>>;

    /// Highest version of every canonical URL
    async fn latest_code_systems(&self) -> Result<Vec<StoredCodeSystem>>;

    /// Store an accepted clinical entry; a repeated id replaces the earlier resource
    async fn insert_clinical_entry(
        &self,
        resource_type: &str,
        id: &str,
        resource: &JsonValue,
    ) -> Result<()>;

    async fn append_audit(&self, record: &AuditRecord) -> Result<()>;

    /// Cheap liveness check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
