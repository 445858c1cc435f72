//! Ingestion pipeline: fetch, normalize, validate, persist.
//!
//! The pipeline is deliberately linear. Each stage narrows the batch (raw
//! entries to normalized papers to validated papers to persisted rows) and
//! every record dropped along the way is counted, never silently lost.

pub mod normalize;

pub use normalize::normalize_entries;

use crate::client::providers::{FetchStatus, SearchRequest, SourceProvider};
use crate::client::query::SearchQueryBuilder;
use crate::models::Paper;
use crate::storage::{IngestCounts, SqliteCatalog};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Accounting for one pipeline run.
///
/// `fetched - normalized` is the number of malformed raw entries the
/// normalizer rejected; `failed_validation` counts normalized papers that
/// violated a record invariant (e.g. a DOI not starting with `10.`).
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Raw entries returned by the provider
    pub fetched: usize,
    /// Papers that survived normalization
    pub normalized: usize,
    /// Papers rejected by pre-persistence validation
    pub failed_validation: usize,
    /// Persistence outcome for the validated papers
    pub counts: IngestCounts,
    /// Whether the underlying fetch ran to completion
    pub status: FetchStatus,
    /// Validated papers, with UUIDs rewritten to stored identities
    pub papers: Vec<Paper>,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} fetched, {} normalized, {} failed validation; {}",
            self.fetched, self.normalized, self.failed_validation, self.counts
        )?;
        if let FetchStatus::Partial { reason } = &self.status {
            write!(f, " (partial fetch: {reason})")?;
        }
        Ok(())
    }
}

/// End-to-end ingestion pipeline over one provider and one catalog
pub struct Pipeline {
    provider: Arc<dyn SourceProvider>,
    catalog: SqliteCatalog,
}

impl Pipeline {
    #[must_use]
    pub fn new(provider: Arc<dyn SourceProvider>, catalog: SqliteCatalog) -> Self {
        Self { provider, catalog }
    }

    /// Run one ingestion: render the query, fetch and normalize, validate,
    /// then upsert into the catalog.
    ///
    /// A partial fetch is not an error; the report carries the degradation
    /// reason and everything that was fetched is still persisted.
    pub async fn run(
        &mut self,
        query: &SearchQueryBuilder,
        max_results: u32,
    ) -> Result<IngestReport> {
        let rendered = query.render();
        info!(
            provider = self.provider.name(),
            query = %rendered,
            max_results,
            "Starting ingestion run"
        );

        let request = SearchRequest::new(rendered, max_results);
        let outcome = self.provider.search(&request).await?;

        if let FetchStatus::Partial { reason } = &outcome.status {
            warn!("Fetch terminated early: {reason}");
        }

        let normalized = outcome.papers.len();
        let mut papers = Vec::with_capacity(normalized);
        let mut failed_validation = 0usize;
        for paper in outcome.papers {
            match paper.validate() {
                Ok(()) => papers.push(paper),
                Err(e) => {
                    warn!("Dropping invalid record {:?}: {e}", paper.title);
                    failed_validation += 1;
                }
            }
        }

        let counts = self.catalog.upsert_papers(&mut papers)?;

        let report = IngestReport {
            fetched: outcome.fetched,
            normalized,
            failed_validation,
            counts,
            status: outcome.status,
            papers,
        };
        info!("Ingestion run finished: {report}");
        Ok(report)
    }

    /// Read access to the underlying catalog
    pub fn catalog(&self) -> &SqliteCatalog {
        &self.catalog
    }
}
