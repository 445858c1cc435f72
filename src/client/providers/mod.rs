//! Scholarly search providers, selected by name through a registry factory.

pub mod scopus;
pub mod traits;

pub use scopus::ScopusProvider;
pub use traits::{
    FetchOutcome, FetchStatus, RawEntry, SearchOutcome, SearchRequest, SourceProvider,
};

use crate::config::ProviderConfig;
use crate::{Error, Result};
use std::sync::Arc;

/// Look up a provider by name.
///
/// One provider is active at a time; adding a new source means adding a
/// variant here and implementing [`SourceProvider`] for it.
pub fn get_provider(name: &str, config: &ProviderConfig) -> Result<Arc<dyn SourceProvider>> {
    match name {
        "scopus" => Ok(Arc::new(ScopusProvider::new(config)?)),
        other => Err(Error::InvalidInput {
            field: "provider".to_string(),
            reason: format!("unknown provider: {other}"),
        }),
    }
}
