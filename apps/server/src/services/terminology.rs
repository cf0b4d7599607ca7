//! Search, lookup and read over stored code systems

use crate::db::TerminologyStore;
use crate::models::StoredCodeSystem;
use crate::{Error, Result};
use medisync_models::{Bundle, BundleEntry, BundleType, Parameters, ValueSet};
use medisync_terminology::{CodeSystemSnapshot, IndexHandle, SearchIndex, SearchLimits};
use serde_json::Value as JsonValue;
use std::sync::Arc;

#[derive(Clone)]
pub struct TerminologyService {
    store: Arc<dyn TerminologyStore>,
    index: Arc<IndexHandle>,
    limits: SearchLimits,
}

impl TerminologyService {
    pub fn new(
        store: Arc<dyn TerminologyStore>,
        index: Arc<IndexHandle>,
        limits: SearchLimits,
    ) -> Self {
        Self {
            store,
            index,
            limits,
        }
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    /// Rebuild the search index from the latest stored version of every URL.
    ///
    /// The generation is reserved before the store is read, so a rebuild that
    /// reads older data can never replace the result of a later one. Returns
    /// whether the new index was installed.
    pub async fn rebuild_index(&self) -> Result<bool> {
        let generation = self.index.reserve_generation();
        let stored = self.store.latest_code_systems().await?;

        let mut snapshots = Vec::with_capacity(stored.len());
        for record in &stored {
            match record.to_snapshot() {
                Ok(snapshot) => snapshots.push(Arc::new(snapshot)),
                Err(e) => tracing::warn!(
                    id = %record.id,
                    url = %record.url,
                    error = %e,
                    "stored code system skipped during index rebuild"
                ),
            }
        }

        let index = SearchIndex::with_generation(generation, snapshots);
        let entries = index.len();
        let installed = self.index.publish(index);
        if installed {
            crate::metrics::record_index(generation, entries);
        }
        Ok(installed)
    }

    /// Ranked search over the current index as an expanded ValueSet
    pub fn search(&self, query: &str, limit: Option<usize>, offset: Option<usize>) -> ValueSet {
        let limit = self.limits.resolve(limit);
        let offset = offset.unwrap_or(0);
        let page = self.index.snapshot().search(query, limit, offset);

        crate::metrics::SEARCH_REQUESTS_TOTAL.inc();
        crate::metrics::SEARCH_RESULTS.observe(page.total as f64);
        tracing::debug!(
            query,
            limit,
            offset,
            total = page.total,
            best_rank = page.hits.first().map(|h| h.rank.as_str()).unwrap_or("none"),
            "terminology search"
        );

        page.to_value_set(query, limit)
    }

    /// `$lookup`: code details from the current index
    pub fn lookup(&self, system: &str, code: &str) -> Result<Parameters> {
        let index = self.index.snapshot();
        let snapshot: &Arc<CodeSystemSnapshot> = index
            .system(system)
            .ok_or_else(|| Error::NotFound(format!("code system {} is not loaded", system)))?;
        let entry = index
            .lookup(system, code)
            .ok_or_else(|| Error::NotFound(format!("code {} not found in {}", code, system)))?;

        let mut params = Parameters::new()
            .string("name", snapshot.name.clone())
            .string("version", snapshot.version.to_string())
            .string("display", entry.display.clone())
            .code("code", entry.code.clone())
            .uri("system", entry.system.clone());
        if let Some(definition) = &entry.definition {
            params = params.string("definition", definition.clone());
        }
        Ok(params)
    }

    /// Stored CodeSystem resource by id
    pub async fn read(&self, id: &str) -> Result<JsonValue> {
        self.store
            .read_code_system(id)
            .await?
            .map(|record| record.resource)
            .ok_or_else(|| Error::NotFound(format!("CodeSystem/{}", id)))
    }

    /// All stored versions of `url`, newest first, as a searchset Bundle
    pub async fn versions(&self, url: &str) -> Result<Bundle> {
        let versions = self.store.code_system_versions(url).await?;
        Ok(searchset(versions))
    }
}

fn searchset(versions: Vec<StoredCodeSystem>) -> Bundle {
    let mut bundle = Bundle::new(BundleType::Searchset);
    bundle.id = Some(uuid::Uuid::new_v4().to_string());
    bundle.timestamp = Some(chrono::Utc::now().to_rfc3339());
    bundle.total = Some(versions.len() as u32);
    bundle.entry = Some(
        versions
            .into_iter()
            .map(|record| BundleEntry {
                full_url: Some(format!("CodeSystem/{}", record.id)),
                resource: Some(record.resource),
                ..Default::default()
            })
            .collect(),
    );
    bundle
}
