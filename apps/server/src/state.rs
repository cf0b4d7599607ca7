//! Shared application state

use crate::classification::ClassificationClient;
use crate::config::Config;
use crate::db::{MemoryStore, PostgresStore, TerminologyStore};
use crate::services::{
    AuditService, BundleService, BundleSettings, IngestionService, TerminologyService,
};
use anyhow::Context as _;
use medisync_terminology::{CodeResolver, IndexHandle};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn TerminologyStore>,
    pub index: Arc<IndexHandle>,
    pub terminology: TerminologyService,
    pub ingestion: IngestionService,
    pub bundles: BundleService,
    pub audit: AuditService,
}

impl AppState {
    /// Connect the configured store and load the search index
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn TerminologyStore> = match config.database.url.as_deref() {
            Some(url) if !url.is_empty() => {
                let store = PostgresStore::connect(url, config.database.pool_max_size)
                    .await
                    .context("connect to database")?;
                if config.database.run_migrations {
                    store.run_migrations().await.context("run database migrations")?;
                }
                tracing::info!("using postgres store");
                Arc::new(store)
            }
            _ => {
                tracing::info!("no database configured; using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Self::with_store(config, store).await
    }

    /// Build the services over an existing store
    pub async fn with_store(
        config: Config,
        store: Arc<dyn TerminologyStore>,
    ) -> anyhow::Result<Self> {
        let classification: Option<Arc<dyn CodeResolver>> =
            match ClassificationClient::from_config(&config.classification)? {
                Some(client) => {
                    tracing::info!(
                        base_url = %config.classification.base_url,
                        "classification authority enabled"
                    );
                    Some(Arc::new(client))
                }
                None => None,
            };
        Self::with_resolvers(config, store, classification).await
    }

    pub async fn with_resolvers(
        config: Config,
        store: Arc<dyn TerminologyStore>,
        classification: Option<Arc<dyn CodeResolver>>,
    ) -> anyhow::Result<Self> {
        let index = Arc::new(IndexHandle::new());
        let audit = AuditService::new(store.clone(), config.logging.audit_enabled);

        let terminology =
            TerminologyService::new(store.clone(), index.clone(), config.search_limits());
        terminology
            .rebuild_index()
            .await
            .context("load search index")?;

        let ingestion = IngestionService::new(store.clone(), terminology.clone(), audit.clone());
        let bundles = BundleService::new(
            store.clone(),
            index.clone(),
            classification,
            BundleSettings {
                mode: config.terminology.validation_mode,
                classification_systems: config.terminology.classification_systems.clone(),
                timeout: config.bundle_timeout(),
            },
            audit.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            index,
            terminology,
            ingestion,
            bundles,
            audit,
        })
    }
}
