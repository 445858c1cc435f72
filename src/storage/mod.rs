//! Catalog store: relational persistence for papers, authors, keywords and
//! the paper/author link table, including the DOI-keyed dedup engine.

pub mod sqlite;

pub use sqlite::SqliteCatalog;

use std::collections::BTreeMap;
use thiserror::Error;

/// Catalog store error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unique constraint violation for DOI {doi}")]
    Conflict { doi: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored record is corrupt: {message}")]
    Corrupt { message: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Per-paper outcome tallies from one persistence pass.
///
/// `inserted` counts new rows; `merged` counts DOI matches reconciled against
/// existing rows; `skipped` counts papers without a DOI plus commit-time
/// conflicts. All three are reported, never discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounts {
    pub inserted: usize,
    pub merged: usize,
    pub skipped: usize,
}

impl IngestCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.merged + self.skipped
    }
}

impl std::fmt::Display for IngestCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} merged, {} skipped",
            self.inserted, self.merged, self.skipped
        )
    }
}

/// Filter for read-side catalog queries
#[derive(Debug, Clone, Default)]
pub struct PaperFilter {
    /// Substring match against title or abstract
    pub text: Option<String>,
    /// Filter by source tag, e.g. "scopus"
    pub source: Option<String>,
    /// Papers published in or after this year (undated papers pass)
    pub start_year: Option<i32>,
    /// Papers published in or before this year (undated papers pass)
    pub end_year: Option<i32>,
    /// Maximum number of results
    pub limit: usize,
}

impl PaperFilter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Self::default()
        }
    }
}

/// Aggregate statistics over the catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogStats {
    pub total_papers: u64,
    pub total_authors: u64,
    /// Paper counts keyed by source tag
    pub papers_by_source: BTreeMap<String, u64>,
    /// Ten most common keywords with their frequencies, descending
    pub top_keywords: Vec<(String, u64)>,
}
