//! CSV ingestion into stored, versioned code systems

use super::audit::AuditService;
use super::terminology::TerminologyService;
use crate::db::TerminologyStore;
use crate::models::{AuditRecord, StoredCodeSystem};
use crate::{Error, Result};
use medisync_terminology::{ingest, IngestRequest, IngestionReport};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn TerminologyStore>,
    terminology: TerminologyService,
    audit: AuditService,
    /// One lock per canonical URL; versions of a URL are assigned one at a time
    url_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn TerminologyStore>,
        terminology: TerminologyService,
        audit: AuditService,
    ) -> Self {
        Self {
            store,
            terminology,
            audit,
            url_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.url_locks.lock().await;
        locks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other ingestion holds or awaits it
    async fn release(&self, url: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.url_locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(url);
        }
    }

    /// Ingest a delimited table as the next version of `request.canonical_url`.
    ///
    /// Returns the FHIR CodeSystem (concepts included) with the ingestion
    /// outcome embedded under `outcome`.
    pub async fn ingest_csv(
        &self,
        body: Vec<u8>,
        request: IngestRequest,
        request_id: Option<String>,
    ) -> Result<JsonValue> {
        let url = request.canonical_url.trim().to_string();
        let result = self.ingest_locked(body, request).await;

        let record = match &result {
            Ok(report) => AuditRecord::new("ingest", true).with_details(json!({
                "codeSystemId": report.code_system.id,
                "version": report.code_system.version,
                "count": report.code_system.count(),
                "rejectedRows": report.errors.len(),
                "duplicateRows": report.warnings.len(),
            })),
            Err(e) => {
                AuditRecord::new("ingest", false).with_details(json!({"error": e.to_string()}))
            }
        };
        self.audit
            .record(record.with_target(url).with_request_id(request_id));

        let report = result?;
        Ok(report.to_fhir().to_value()?)
    }

    async fn ingest_locked(
        &self,
        body: Vec<u8>,
        request: IngestRequest,
    ) -> Result<IngestionReport> {
        let url = request.canonical_url.trim().to_string();
        let lock = self.lock_for(&url).await;
        let result = {
            let _guard = lock.lock().await;
            self.store_next_version(&url, body, request).await
        };
        self.release(&url, lock).await;
        result
    }

    async fn store_next_version(
        &self,
        url: &str,
        body: Vec<u8>,
        request: IngestRequest,
    ) -> Result<IngestionReport> {
        let prior_versions = self.store.count_versions(url).await?;
        let report = tokio::task::spawn_blocking(move || {
            ingest(Cursor::new(body), &request, prior_versions)
        })
        .await
        .map_err(|e| Error::Internal(format!("ingestion task failed: {}", e)))??;

        let record = StoredCodeSystem::from_snapshot(&report.code_system)
            .map_err(medisync_terminology::IngestError::from)?;
        self.store.insert_code_system(&record).await?;

        crate::metrics::CODE_SYSTEM_VERSIONS_TOTAL.inc();
        crate::metrics::INGESTION_ROWS_TOTAL
            .with_label_values(&["accepted"])
            .inc_by(report.code_system.count() as u64);
        crate::metrics::INGESTION_ROWS_TOTAL
            .with_label_values(&["rejected"])
            .inc_by(report.errors.len() as u64);
        crate::metrics::INGESTION_ROWS_TOTAL
            .with_label_values(&["duplicate"])
            .inc_by(report.warnings.len() as u64);

        if let Err(e) = self.terminology.rebuild_index().await {
            tracing::error!(url = %url, error = %e, "index rebuild after ingestion failed");
        }

        tracing::info!(
            url = %url,
            id = %record.id,
            version = record.version,
            count = report.code_system.count(),
            "code system version stored"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use medisync_terminology::{IndexHandle, SearchLimits};

    const URL: &str = "http://terminology.india.gov.in/namaste";

    fn service() -> (IngestionService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let terminology = TerminologyService::new(
            store.clone(),
            Arc::new(IndexHandle::new()),
            SearchLimits::default(),
        );
        let audit = AuditService::new(store.clone(), true);
        (IngestionService::new(store.clone(), terminology, audit), store)
    }

    #[tokio::test]
    async fn concurrent_ingests_get_distinct_versions() {
        let (service, store) = service();
        let csv = b"code,display\nNAM001,Vataja Jvara\n".to_vec();

        let a = service.ingest_csv(csv.clone(), IngestRequest::new("NAMASTE", URL), None);
        let b = service.ingest_csv(csv, IngestRequest::new("NAMASTE", URL), None);
        let (a, b) = tokio::join!(a, b);

        let mut versions = vec![
            a.unwrap()["version"].as_str().unwrap().to_string(),
            b.unwrap()["version"].as_str().unwrap().to_string(),
        ];
        versions.sort();
        assert_eq!(versions, vec!["1", "2"]);
        assert_eq!(store.count_versions(URL).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn ingest_publishes_to_index() {
        let (service, _store) = service();
        let body = b"code,display,notes\nNAM001,Vataja Jvara,x\n,missing code,y\n".to_vec();
        let json = service
            .ingest_csv(body, IngestRequest::new("NAMASTE", URL), Some("req-1".into()))
            .await
            .unwrap();

        assert_eq!(json["count"], 1);
        assert_eq!(json["outcome"]["issue"].as_array().unwrap().len(), 2);
        assert_eq!(service.terminology.search("jvara", None, None).contains().len(), 1);
    }

    #[tokio::test]
    async fn url_locks_are_released() {
        let (service, _store) = service();
        let csv = b"code,display\nNAM001,Vataja Jvara\n".to_vec();

        let a = service.ingest_csv(csv.clone(), IngestRequest::new("NAMASTE", URL), None);
        let b = service.ingest_csv(csv, IngestRequest::new("NAMASTE", URL), None);
        let (a, b) = tokio::join!(a, b);
        assert!(a.is_ok() && b.is_ok());

        let request = IngestRequest::new("X", "http://example.org/x");
        let failed = service.ingest_csv(b"name\nx\n".to_vec(), request, None).await;
        assert!(failed.is_err());
        assert!(service.url_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn fatal_ingestion_stores_nothing() {
        let (service, store) = service();
        let err = service
            .ingest_csv(b"name\nx\n".to_vec(), IngestRequest::new("NAMASTE", URL), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ingestion(_)));
        assert_eq!(store.count_versions(URL).await.unwrap(), 0);
    }
}
