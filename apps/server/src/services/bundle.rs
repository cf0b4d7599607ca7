//! Bundle upload: validation, write-through and the batch-response

use super::audit::AuditService;
use crate::db::TerminologyStore;
use crate::models::AuditRecord;
use crate::Result;
use async_trait::async_trait;
use medisync_terminology::{
    BundleProcessor, CodeResolver, EntrySink, EntryValidator, IndexHandle, ProcessedBundle,
    SinkError, ValidationMode,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Writes accepted entries through to the store
pub struct StoreSink {
    store: Arc<dyn TerminologyStore>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn TerminologyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntrySink for StoreSink {
    async fn persist(
        &self,
        resource_type: &str,
        id: &str,
        resource: &JsonValue,
    ) -> std::result::Result<(), SinkError> {
        self.store
            .insert_clinical_entry(resource_type, id, resource)
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct BundleSettings {
    pub mode: ValidationMode,
    pub classification_systems: Vec<String>,
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct BundleService {
    processor: Arc<BundleProcessor>,
    sink: Arc<StoreSink>,
    audit: AuditService,
}

impl BundleService {
    pub fn new(
        store: Arc<dyn TerminologyStore>,
        index: Arc<IndexHandle>,
        classification: Option<Arc<dyn CodeResolver>>,
        settings: BundleSettings,
        audit: AuditService,
    ) -> Self {
        let mut validator = EntryValidator::new(index)
            .with_mode(settings.mode)
            .with_classification_systems(settings.classification_systems);
        if let Some(resolver) = classification {
            validator = validator.with_classification_resolver(resolver);
        }

        Self {
            processor: Arc::new(BundleProcessor::new(validator).with_timeout(settings.timeout)),
            sink: Arc::new(StoreSink::new(store)),
            audit,
        }
    }

    /// Process an uploaded bundle and render the batch-response
    pub async fn upload(
        &self,
        bundle: &JsonValue,
        request_id: Option<String>,
    ) -> Result<JsonValue> {
        let started = Instant::now();
        let result = self.processor.process(bundle, self.sink.as_ref()).await;
        crate::metrics::BUNDLE_PROCESSING_SECONDS.observe(started.elapsed().as_secs_f64());

        let record = match &result {
            Ok(processed) => {
                record_entry_metrics(processed);
                AuditRecord::new("bundle-upload", true).with_details(json!({
                    "total": processed.summary.total,
                    "accepted": processed.summary.accepted,
                    "rejected": processed.summary.rejected,
                    "warnings": processed.summary.warnings,
                }))
            }
            Err(e) => AuditRecord::new("bundle-upload", false)
                .with_details(json!({"error": e.to_string()})),
        };
        self.audit.record(record.with_request_id(request_id));

        let processed = result?;
        Ok(processed.to_fhir().to_value()?)
    }
}

fn record_entry_metrics(processed: &ProcessedBundle) {
    for entry in &processed.entries {
        let status = entry.status_line().split(' ').next().unwrap_or("unknown");
        crate::metrics::BUNDLE_ENTRIES_TOTAL
            .with_label_values(&[status])
            .inc();
    }
}
