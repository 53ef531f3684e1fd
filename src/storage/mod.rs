//! Report persistence (the Librarian).
//!
//! Finished [`ResearchReport`]s are stored with [`MemoryMetadata`] and can be
//! listed newest-first, fetched, deleted by id, and searched by keyword.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::schema::{MemoryMetadata, ResearchReport};

/// A stored report with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Document id assigned at store time.
    pub id: String,
    /// The persisted report.
    pub report: ResearchReport,
    /// When it was stored and how often it was read.
    pub metadata: MemoryMetadata,
}

impl MemoryEntry {
    /// Persisted document shape: `{report, metadata}`.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "report": self.report,
            "metadata": self.metadata,
        })
    }
}

/// Storage trait for report persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a report, returning its new id.
    async fn store_report(&self, report: &ResearchReport) -> StorageResult<String>;
    /// All reports, newest first.
    async fn list_reports(&self) -> StorageResult<Vec<MemoryEntry>>;
    /// Get a report by id.
    async fn get_report(&self, id: &str) -> StorageResult<Option<MemoryEntry>>;
    /// Delete a report by id; false if no such report.
    async fn delete_report(&self, id: &str) -> StorageResult<bool>;
    /// Reports matching `query` per [`matches_query`], newest first.
    async fn search_reports(&self, query: &str) -> StorageResult<Vec<MemoryEntry>>;
}

/// Keyword match used by [`Storage::search_reports`].
///
/// Case-insensitive. A report matches when the whole query, or any single
/// word of it, occurs in its summary, recommendation, mapping explanation
/// or findings. A blank query matches nothing.
pub fn matches_query(report: &ResearchReport, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return false;
    }

    let mut searchable = vec![
        report.summary.as_str(),
        report.recommendation.as_str(),
        report.hypothesis.mapping.explanation.as_str(),
    ];
    searchable.extend(report.findings.iter().map(String::as_str));
    let searchable = searchable.join(" ").to_lowercase();

    searchable.contains(&query) || query.split_whitespace().any(|w| searchable.contains(w))
}
