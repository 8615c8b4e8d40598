use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::record::{LogRecord, TIMESTAMP_FIELD};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Durable secondary destination for records the aggregator did not accept.
#[async_trait]
pub trait FallbackStore: Send + Sync {
    /// Append all records, returning how many were written.
    async fn append_many(&self, records: &[LogRecord]) -> Result<usize, StoreError>;
}

/// Monthly index a record belongs to: `logs-{tenant}-{YYYY-MM}`.
pub fn index_name(record: &LogRecord, appended_at: DateTime<Utc>) -> String {
    let tenant = record
        .get("tenant_id")
        .and_then(Value::as_str)
        .unwrap_or("default");

    let month = record
        .get(TIMESTAMP_FIELD)
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(appended_at)
        .format("%Y-%m");

    format!("logs-{}-{}", tenant, month)
}

/// DuckDB-backed fallback store
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "Opened fallback store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory instance (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);

            conn.execute(
                "CREATE TABLE IF NOT EXISTS fallback_logs (
                    id UUID PRIMARY KEY,
                    index_name VARCHAR NOT NULL,
                    tenant_id VARCHAR NOT NULL,
                    appended_at TIMESTAMPTZ NOT NULL,
                    record JSON NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_fallback_logs_index ON fallback_logs(index_name)",
                [],
            )?;

            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM fallback_logs", [], |row| row.get(0))?;
            Ok::<u64, StoreError>(count.max(0) as u64)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// All stored records with their index names, in append order.
    pub async fn records(&self) -> Result<Vec<(String, LogRecord)>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let mut stmt = conn.prepare(
                "SELECT index_name, CAST(record AS VARCHAR) FROM fallback_logs ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut records: Vec<(String, LogRecord)> = Vec::new();
            for row in rows {
                let (index_name, json) = row?;
                records.push((index_name, serde_json::from_str(&json)?));
            }
            Ok::<_, StoreError>(records)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl FallbackStore for DuckDbStore {
    async fn append_many(&self, records: &[LogRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let appended_at = Utc::now();
        let rows = records
            .iter()
            .map(|record| {
                let tenant = record
                    .get("tenant_id")
                    .and_then(Value::as_str)
                    .unwrap_or("default")
                    .to_string();
                Ok((
                    Uuid::new_v4().to_string(),
                    index_name(record, appended_at),
                    tenant,
                    serde_json::to_string(record)?,
                ))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO fallback_logs (id, index_name, tenant_id, appended_at, record)
                     VALUES (?, ?, ?, to_timestamp(? / 1000000.0), ?)",
                )?;
                for (id, index_name, tenant, json) in &rows {
                    stmt.execute(duckdb::params![
                        id,
                        index_name,
                        tenant,
                        appended_at.timestamp_micros(),
                        json,
                    ])?;
                }
            }
            tx.commit()?;

            tracing::info!(count = rows.len(), "Appended records to fallback store");
            Ok::<usize, StoreError>(rows.len())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
