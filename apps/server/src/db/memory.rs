//! In-process store, used when no database URL is configured

use super::traits::TerminologyStore;
use crate::models::{AuditRecord, StoredCodeSystem};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    code_systems: RwLock<Vec<StoredCodeSystem>>,
    clinical_entries: RwLock<HashMap<(String, String), JsonValue>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clinical_entry(&self, resource_type: &str, id: &str) -> Option<JsonValue> {
        self.clinical_entries
            .read()
            .await
            .get(&(resource_type.to_string(), id.to_string()))
            .cloned()
    }

    pub async fn clinical_entry_count(&self) -> usize {
        self.clinical_entries.read().await.len()
    }

    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.read().await.clone()
    }
}

#[async_trait]
impl TerminologyStore for MemoryStore {
    async fn count_versions(&self, url: &str) -> Result<u32> {
        let systems = self.code_systems.read().await;
        Ok(systems.iter().filter(|cs| cs.url == url).count() as u32)
    }

    async fn insert_code_system(&self, record: &StoredCodeSystem) -> Result<()> {
        let mut systems = self.code_systems.write().await;
        if systems
            .iter()
            .any(|cs| cs.id == record.id || (cs.url == record.url && cs.version == record.version))
        {
            return Err(Error::Internal(format!(
                "code system {} version {} already stored",
                record.url, record.version
            )));
        }
        systems.push(record.clone());
        Ok(())
    }

    async fn read_code_system(&self, id: &str) -> Result<Option<StoredCodeSystem>> {
        let systems = self.code_systems.read().await;
        Ok(systems.iter().find(|cs| cs.id == id).cloned())
    }

    async fn code_system_versions(&self, url: &str) -> Result<Vec<StoredCodeSystem>> {
        let systems = self.code_systems.read().await;
        let mut versions: Vec<StoredCodeSystem> =
            systems.iter().filter(|cs| cs.url == url).cloned().collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn latest_code_systems(&self) -> Result<Vec<StoredCodeSystem>> {
        let systems = self.code_systems.read().await;
        let mut latest: Vec<StoredCodeSystem> = Vec::new();
        for cs in systems.iter() {
            match latest.iter_mut().find(|l| l.url == cs.url) {
                Some(existing) if existing.version < cs.version => *existing = cs.clone(),
                Some(_) => {}
                None => latest.push(cs.clone()),
            }
        }
        Ok(latest)
    }

    async fn insert_clinical_entry(
        &self,
        resource_type: &str,
        id: &str,
        resource: &JsonValue,
    ) -> Result<()> {
        self.clinical_entries
            .write()
            .await
            .insert((resource_type.to_string(), id.to_string()), resource.clone());
        Ok(())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.audit.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(url: &str, version: u32) -> StoredCodeSystem {
        StoredCodeSystem {
            id: format!("{}-{}", url.len(), version),
            url: url.to_string(),
            name: "Test".to_string(),
            version,
            resource: json!({"resourceType": "CodeSystem"}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn versions_are_append_only() {
        let store = MemoryStore::new();
        store.insert_code_system(&record("http://a.org/cs", 1)).await.unwrap();
        store.insert_code_system(&record("http://a.org/cs", 2)).await.unwrap();
        store.insert_code_system(&record("http://b.org/other", 1)).await.unwrap();

        assert!(store.insert_code_system(&record("http://a.org/cs", 2)).await.is_err());
        assert_eq!(store.count_versions("http://a.org/cs").await.unwrap(), 2);

        let versions = store.code_system_versions("http://a.org/cs").await.unwrap();
        assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![2, 1]);

        let latest = store.latest_code_systems().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].version, 2);
        assert_eq!(latest[1].url, "http://b.org/other");
    }

    #[tokio::test]
    async fn clinical_entry_replaced_by_id() {
        let store = MemoryStore::new();
        store
            .insert_clinical_entry("Condition", "c1", &json!({"v": 1}))
            .await
            .unwrap();
        store
            .insert_clinical_entry("Condition", "c1", &json!({"v": 2}))
            .await
            .unwrap();
        assert_eq!(store.clinical_entry_count().await, 1);
        assert_eq!(
            store.clinical_entry("Condition", "c1").await,
            Some(json!({"v": 2}))
        );
    }
}
