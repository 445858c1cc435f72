//! Canonical bibliographic records produced by normalization and stored in
//! the catalog.
//!
//! Papers and authors are independent value objects keyed by UUID; the
//! many-to-many relationship between them is materialized as explicit
//! [`PaperAuthorLink`] records rather than embedded back-pointers, so the
//! object graph stays acyclic.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Canonical bibliographic record for a single paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Unique identifier, generated at normalization time
    pub uuid: Uuid,
    /// Paper title (required, non-empty)
    pub title: String,
    /// Authors as captured from this ingestion event
    pub authors: Vec<Author>,
    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Publication date, serialized as YYYY-MM-DD
    pub publication_date: Option<NaiveDate>,
    /// Journal name
    pub journal: Option<String>,
    /// Digital Object Identifier; the dedup key when present
    pub doi: Option<String>,
    /// Canonical URL for the record
    pub url: Option<String>,
    /// Citation count as observed at fetch time
    pub citations: Option<u64>,
    /// Author keywords, ordered and deduplicated per paper
    pub keywords: Vec<String>,
    /// Source tag, e.g. "scopus"
    pub source: String,
    /// Source-native identifier
    pub source_id: Option<String>,
    /// Provider-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// UUIDs of the authors on this record
    #[serde(default)]
    pub author_uuids: Vec<Uuid>,
}

impl Paper {
    /// Create a paper with a fresh UUID and the given title/source
    #[must_use]
    pub fn new(title: String, source: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title,
            authors: Vec::new(),
            abstract_text: None,
            publication_date: None,
            journal: None,
            doi: None,
            url: None,
            citations: None,
            keywords: Vec::new(),
            source,
            source_id: None,
            metadata: HashMap::new(),
            author_uuids: Vec::new(),
        }
    }

    /// Validate the record invariants before persistence.
    ///
    /// A paper must carry a non-empty title, a well-formed DOI when one is
    /// present, and a non-negative citation count (guaranteed by the type).
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput {
                field: "title".to_string(),
                reason: "title must not be empty".to_string(),
            });
        }
        if let Some(doi) = &self.doi {
            validate_doi(doi)?;
        }
        Ok(())
    }

    /// Publication year, if a date is known
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.publication_date.map(|d| d.year())
    }
}

impl std::fmt::Display for Paper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} authors, {})",
            self.title,
            self.authors.len(),
            self.publication_date
                .map_or_else(|| "no date".to_string(), |d| d.to_string())
        )
    }
}

/// Validate a DOI string; DOIs registered by CrossRef et al. start with "10."
pub fn validate_doi(doi: &str) -> Result<()> {
    if !doi.starts_with("10.") {
        return Err(Error::InvalidInput {
            field: "doi".to_string(),
            reason: format!("DOI must start with 10., got {doi:?}"),
        });
    }
    Ok(())
}

/// Author as observed on a single ingestion event.
///
/// The same human author appearing on several papers gets a distinct row per
/// paper; authors are deliberately not deduplicated by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    /// Unique identifier, generated at normalization time
    pub uuid: Uuid,
    /// Author name (may be empty if missing from the source)
    pub name: String,
    /// Affiliation as reported by the source
    pub affiliation: Option<String>,
    /// ORCID identifier
    pub orcid: Option<String>,
}

impl Author {
    #[must_use]
    pub fn new(name: String, affiliation: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            affiliation,
            orcid: None,
        }
    }
}

/// Keyword row owned by one paper; repeated text across papers is expected
/// and only matters for aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub uuid: Uuid,
    pub keyword: String,
    pub paper_uuid: Uuid,
}

/// Composite-key association materializing the paper/author relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAuthorLink {
    pub paper_uuid: Uuid,
    pub author_uuid: Uuid,
}
