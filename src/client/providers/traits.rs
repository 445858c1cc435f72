use crate::models::Paper;
use crate::Result;
use async_trait::async_trait;

/// Raw, loosely-typed entry as returned by a provider before normalization
pub type RawEntry = serde_json::Value;

/// Parameters for a paginated provider search
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Rendered provider query string
    pub query: String,
    /// Upper bound on entries fetched across all pages
    pub max_results: u32,
    /// Requested entries per page; capped by the provider's own maximum
    pub page_size: u32,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: String, max_results: u32) -> Self {
        Self {
            query,
            max_results,
            page_size: 100,
        }
    }
}

/// Completion status of a paginated fetch.
///
/// A fetch that hits a non-retryable provider error or exhausts retries does
/// not fail the run; it degrades to `Partial` carrying whatever entries were
/// accumulated, with the reason preserved for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// All requested pages were fetched
    Complete,
    /// Pagination stopped early; accumulated entries are still usable
    Partial { reason: String },
}

impl FetchStatus {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, FetchStatus::Complete)
    }
}

/// Outcome of the paginated fetch loop, before normalization
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Raw entries in fetch order
    pub entries: Vec<RawEntry>,
    /// Whether pagination ran to completion
    pub status: FetchStatus,
    /// Number of HTTP requests issued
    pub requests: u32,
}

/// Outcome of a full provider search: fetch plus normalization
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Normalized papers in fetch order
    pub papers: Vec<Paper>,
    /// Raw entry count before normalization
    pub fetched: usize,
    /// Completion status of the underlying fetch
    pub status: FetchStatus,
}

/// Trait for scholarly search providers.
///
/// Concrete providers are selected by name through [`super::get_provider`];
/// there is no inheritance hierarchy, just this capability interface.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Unique name/identifier for this provider
    fn name(&self) -> &str;

    /// Fetch raw entries page by page, degrading gracefully on failure
    async fn fetch_raw(&self, request: &SearchRequest) -> Result<FetchOutcome>;

    /// Normalize raw entries into canonical papers, skipping malformed ones
    fn parse_results(&self, entries: &[RawEntry]) -> Vec<Paper>;

    /// Search for papers: fetch then normalize
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let outcome = self.fetch_raw(request).await?;
        let papers = self.parse_results(&outcome.entries);
        Ok(SearchOutcome {
            papers,
            fetched: outcome.entries.len(),
            status: outcome.status,
        })
    }
}
