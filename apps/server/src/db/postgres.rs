//! Postgres-backed store

use super::traits::TerminologyStore;
use crate::models::{AuditRecord, StoredCodeSystem};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

const CODE_SYSTEM_COLUMNS: &str = "id, url, name, version, resource, created_at";

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

fn code_system_from_row(row: &PgRow) -> Result<StoredCodeSystem> {
    let version: i32 = row.try_get("version")?;
    Ok(StoredCodeSystem {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        version: u32::try_from(version)
            .map_err(|_| Error::Internal(format!("negative code system version {}", version)))?,
        resource: row.try_get::<JsonValue, _>("resource")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl TerminologyStore for PostgresStore {
    async fn count_versions(&self, url: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_systems WHERE url = $1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u32)
    }

    async fn insert_code_system(&self, record: &StoredCodeSystem) -> Result<()> {
        sqlx::query(
            "INSERT INTO code_systems (id, url, name, version, resource, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.id)
        .bind(&record.url)
        .bind(&record.name)
        .bind(record.version as i32)
        .bind(&record.resource)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read_code_system(&self, id: &str) -> Result<Option<StoredCodeSystem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM code_systems WHERE id = $1",
            CODE_SYSTEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(code_system_from_row).transpose()
    }

    async fn code_system_versions(&self, url: &str) -> Result<Vec<StoredCodeSystem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM code_systems WHERE url = $1 ORDER BY version DESC",
            CODE_SYSTEM_COLUMNS
        ))
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(code_system_from_row).collect()
    }

    async fn latest_code_systems(&self) -> Result<Vec<StoredCodeSystem>> {
        let rows = sqlx::query(&format!(
            "SELECT {cols} FROM (
                 SELECT DISTINCT ON (url) {cols}
                 FROM code_systems
                 ORDER BY url, version DESC
             ) latest
             ORDER BY created_at",
            cols = CODE_SYSTEM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(code_system_from_row).collect()
    }

    async fn insert_clinical_entry(
        &self,
        resource_type: &str,
        id: &str,
        resource: &JsonValue,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO clinical_entries (resource_type, id, resource)
             VALUES ($1, $2, $3)
             ON CONFLICT (resource_type, id)
             DO UPDATE SET resource = EXCLUDED.resource, updated_at = now()",
        )
        .bind(resource_type)
        .bind(id)
        .bind(resource)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (id, action, outcome, request_id, target, details, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(&record.action)
        .bind(&record.outcome)
        .bind(&record.request_id)
        .bind(&record.target)
        .bind(&record.details)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
