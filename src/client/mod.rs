//! HTTP-facing side of the pipeline: query assembly and search providers.

pub mod providers;
pub mod query;

pub use providers::{
    get_provider, FetchOutcome, FetchStatus, RawEntry, ScopusProvider, SearchOutcome,
    SearchRequest, SourceProvider,
};
pub use query::{DateInput, SearchQueryBuilder};
