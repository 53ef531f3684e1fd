use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{matches_query, MemoryEntry, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::schema::{MemoryMetadata, ResearchReport};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_all_entries(&self) -> StorageResult<Vec<MemoryEntry>> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, report, stored_at, frequency
            FROM reports
            ORDER BY stored_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(ReportRow::into_entry).collect())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn store_report(&self, report: &ResearchReport) -> StorageResult<String> {
        let id = Uuid::new_v4().to_string();
        let metadata = MemoryMetadata::new(Utc::now());
        let report_json = serde_json::to_string(report)?;

        sqlx::query(
            r#"
            INSERT INTO reports (id, report, stored_at, frequency)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&report_json)
        // Fixed-width timestamps keep ORDER BY stored_at chronological
        .bind(metadata.stored_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(metadata.frequency)
        .execute(&self.pool)
        .await?;

        debug!(report_id = %id, "Report stored");
        Ok(id)
    }

    async fn list_reports(&self) -> StorageResult<Vec<MemoryEntry>> {
        self.fetch_all_entries().await
    }

    async fn get_report(&self, id: &str) -> StorageResult<Option<MemoryEntry>> {
        let row: Option<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, report, stored_at, frequency
            FROM reports
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let report: ResearchReport = serde_json::from_str(&row.report)?;
                Ok(Some(MemoryEntry {
                    metadata: row.metadata(),
                    id: row.id,
                    report,
                }))
            }
        }
    }

    async fn delete_report(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search_reports(&self, query: &str) -> StorageResult<Vec<MemoryEntry>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.fetch_all_entries().await?;
        Ok(entries
            .into_iter()
            .filter(|entry| matches_query(&entry.report, query))
            .collect())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct ReportRow {
    id: String,
    report: String,
    stored_at: String,
    frequency: i64,
}

impl ReportRow {
    fn metadata(&self) -> MemoryMetadata {
        MemoryMetadata {
            stored_at: DateTime::parse_from_rfc3339(&self.stored_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            frequency: u32::try_from(self.frequency).unwrap_or(0),
        }
    }

    /// Rows whose report no longer deserializes are skipped in listings.
    fn into_entry(self) -> Option<MemoryEntry> {
        match serde_json::from_str::<ResearchReport>(&self.report) {
            Ok(report) => Some(MemoryEntry {
                metadata: self.metadata(),
                id: self.id,
                report,
            }),
            Err(e) => {
                warn!(report_id = %self.id, error = %e, "Skipping unreadable report");
                None
            }
        }
    }
}
