pub mod assertions;
pub mod builders;
pub mod fixtures;

use anyhow::Context as _;
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    Router,
};
use futures::FutureExt as _;
use medisync::{
    api::create_router,
    db::{MemoryStore, TerminologyStore},
    models::{AuditRecord, StoredCodeSystem},
    AppState, Config,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt as _;

// Re-export commonly used items
pub use assertions::*;
pub use builders::*;
pub use fixtures::*;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::new_with_config(|_| {}).await
    }

    pub async fn new_with_config(configure: impl FnOnce(&mut Config)) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::with_store(configure, store.clone(), store).await
    }

    /// App over an arbitrary store; `memory` is the inspectable backing store
    pub async fn with_store(
        configure: impl FnOnce(&mut Config),
        store: Arc<dyn TerminologyStore>,
        memory: Arc<MemoryStore>,
    ) -> anyhow::Result<Self> {
        let mut config = Config::default();
        configure(&mut config);

        let state = AppState::with_resolvers(config, store, None)
            .await
            .context("initialize AppState")?;
        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            store: memory,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        self.request_with_extra_headers(method, path_and_query, body, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
        extra_headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let mut request = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header("host", "example.org")
            .header("accept", "application/fhir+json")
            .header("content-type", "application/fhir+json")
            .body(match body {
                Some(bytes) => Body::from(bytes),
                None => Body::empty(),
            })
            .context("build request")?;

        for (name, value) in extra_headers {
            request.headers_mut().insert(
                name.parse::<HeaderName>().context("parse header name")?,
                value.parse::<HeaderValue>().context("parse header value")?,
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read response body")?;

        Ok((status, headers, body))
    }

    /// GET and parse the JSON body
    pub async fn get_json(&self, path_and_query: &str) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self.request(Method::GET, path_and_query, None).await?;
        Ok((status, parse_json(&body)?))
    }

    /// POST a raw delimited table to `/ingest/csv`
    pub async fn ingest(
        &self,
        name: &str,
        url: &str,
        csv: &str,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let path = format!(
            "/ingest/csv?name={}&url={}",
            encode(name),
            encode(url)
        );
        let (status, _headers, body) = self
            .request_with_extra_headers(
                Method::POST,
                &path,
                Some(Bytes::from(csv.to_string())),
                &[("content-type", "text/csv")],
            )
            .await?;
        Ok((status, parse_json(&body)?))
    }

    /// POST a bundle to `/bundle/upload`
    pub async fn upload(&self, bundle: &Value) -> anyhow::Result<(StatusCode, Value)> {
        let (status, _headers, body) = self
            .request(Method::POST, "/bundle/upload", Some(to_json_body(bundle)?))
            .await?;
        Ok((status, parse_json(&body)?))
    }
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let app = TestApp::new_with_config(configure).await?;
    run(app, f).await
}

/// Like [`with_test_app`], but clinical-entry writes fail
pub async fn with_failing_sink_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(FailingClinicalStore {
        inner: memory.clone(),
    });
    let app = TestApp::with_store(|_| {}, store, memory).await?;
    run(app, f).await
}

async fn run<F>(app: TestApp, f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;
    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Memory store whose clinical-entry inserts always fail
struct FailingClinicalStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl TerminologyStore for FailingClinicalStore {
    async fn count_versions(&self, url: &str) -> medisync::Result<u32> {
        self.inner.count_versions(url).await
    }

    async fn insert_code_system(&self, record: &StoredCodeSystem) -> medisync::Result<()> {
        self.inner.insert_code_system(record).await
    }

    async fn read_code_system(&self, id: &str) -> medisync::Result<Option<StoredCodeSystem>> {
        self.inner.read_code_system(id).await
    }

    async fn code_system_versions(&self, url: &str) -> medisync::Result<Vec<StoredCodeSystem>> {
        self.inner.code_system_versions(url).await
    }

    async fn latest_code_systems(&self) -> medisync::Result<Vec<StoredCodeSystem>> {
        self.inner.latest_code_systems().await
    }

    async fn insert_clinical_entry(
        &self,
        _resource_type: &str,
        _id: &str,
        _resource: &Value,
    ) -> medisync::Result<()> {
        Err(medisync::Error::Unavailable(
            "connection refused".to_string(),
        ))
    }

    async fn append_audit(&self, record: &AuditRecord) -> medisync::Result<()> {
        self.inner.append_audit(record).await
    }
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

pub fn parse_json(body: &[u8]) -> anyhow::Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).context("parse response body as JSON")
}

/// Minimal query-component escaping for test URLs
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
