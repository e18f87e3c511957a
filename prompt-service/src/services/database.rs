//! PostgreSQL persistence for prompt-service.
//!
//! Each variant's records live in their own table with a `BIGSERIAL` id, so
//! identities are assigned by the database and strictly increase per table.
//! Every operation is a single statement on a pooled connection; the pool
//! guard returns the connection on every exit path.

use crate::models::{ListRecords, Record, Variant};
use crate::services::metrics::{record_db_error, record_db_operation};
use crate::services::store::{RecordStore, StoreError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{info, instrument};

const RECORD_COLUMNS: &str = "id, input_text, output_text, created_at, updated_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "prompt-service"))]
    pub async fn new(
        database_url: &Secret<String>,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url.expose_secret())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Store for one variant's table, sharing this pool.
    pub fn record_store(&self, variant: Variant) -> PgRecordStore {
        PgRecordStore {
            pool: self.pool.clone(),
            variant,
        }
    }
}

/// [`RecordStore`] backed by one PostgreSQL table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    variant: Variant,
}

impl PgRecordStore {
    fn table(&self) -> &'static str {
        self.variant.table()
    }

    fn backend_error(&self, operation: &str, e: sqlx::Error) -> StoreError {
        record_db_error(operation, self.table());
        tracing::error!(operation = operation, table = self.table(), error = %e, "Database operation failed");
        StoreError::Backend(format!("Failed to {} record: {}", operation, e))
    }

    fn observe(&self, operation: &str, start: Instant) {
        record_db_operation(operation, self.table(), start.elapsed().as_secs_f64());
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, input_text), fields(table = self.table(), input_len = input_text.len()))]
    async fn create(&self, input_text: &str) -> Result<Record, StoreError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, Record>(&format!(
            "INSERT INTO {} (input_text) VALUES ($1) RETURNING {}",
            self.table(),
            RECORD_COLUMNS
        ))
        .bind(input_text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.backend_error("create", e))?;

        self.observe("create", start);
        info!(record_id = record.id, "Record created");

        Ok(record)
    }

    #[instrument(skip(self, output_text), fields(table = self.table(), record_id = id))]
    async fn update_output(&self, id: i64, output_text: &str) -> Result<Record, StoreError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, Record>(&format!(
            "UPDATE {} SET output_text = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            self.table(),
            RECORD_COLUMNS
        ))
        .bind(id)
        .bind(output_text)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.backend_error("update", e))?;

        self.observe("update", start);

        let record = record.ok_or(StoreError::NotFound { id })?;
        info!(record_id = record.id, "Record output stored");

        Ok(record)
    }

    #[instrument(skip(self), fields(table = self.table()))]
    async fn get(&self, id: i64) -> Result<Option<Record>, StoreError> {
        let start = Instant::now();

        let record = sqlx::query_as::<_, Record>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            RECORD_COLUMNS,
            self.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.backend_error("get", e))?;

        self.observe("get", start);

        Ok(record)
    }

    #[instrument(skip(self), fields(table = self.table()))]
    async fn list(&self, page: ListRecords) -> Result<Vec<Record>, StoreError> {
        let start = Instant::now();

        let records = sqlx::query_as::<_, Record>(&format!(
            r#"
            SELECT {}
            FROM {}
            WHERE ($1::bigint IS NULL OR id < $1)
            ORDER BY id DESC
            LIMIT $2
            "#,
            RECORD_COLUMNS,
            self.table()
        ))
        .bind(page.before_id)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.backend_error("list", e))?;

        self.observe("list", start);

        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
