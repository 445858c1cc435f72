//! litharvest: paper ingestion and deduplication for scholarly search APIs.
//!
//! The crate fetches paginated search results from a provider (Scopus),
//! normalizes the loosely-typed JSON entries into canonical [`models::Paper`]
//! records, and upserts them into a DOI-deduplicated SQLite catalog.
//! Repeated ingestions of overlapping queries converge instead of piling up
//! duplicates, and citation counts only ever move upward.

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod resilience;
pub mod storage;

pub use client::{
    get_provider, FetchOutcome, FetchStatus, ScopusProvider, SearchQueryBuilder, SearchRequest,
    SourceProvider,
};
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use export::ResultEnvelope;
pub use ingest::{IngestReport, Pipeline};
pub use models::{Author, Paper};
pub use resilience::RetryConfig;
pub use storage::{IngestCounts, PaperFilter, SqliteCatalog};
