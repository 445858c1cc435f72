//! Normalization of raw Scopus entries into canonical [`Paper`] records.
//!
//! Entries arrive loosely typed: the author field may be a single object or a
//! list, the citation count is string-encoded, dates are plain strings.
//! A malformed entry is dropped individually and the rest of the batch
//! continues; output order mirrors input order.

use crate::client::providers::RawEntry;
use crate::models::{Author, Paper};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

/// Source tag attached to every normalized record
const SOURCE: &str = "scopus";

/// A field that may hold one value or a list of values
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Author object inside a raw entry
#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(rename = "authname")]
    name: Option<String>,
    #[serde(rename = "affilname")]
    affiliation: Option<String>,
    orcid: Option<String>,
}

/// Raw Scopus search entry, as far as the pipeline reads it
#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "author")]
    authors: Option<OneOrMany<RawAuthor>>,
    #[serde(rename = "dc:description")]
    description: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "prism:url")]
    url: Option<String>,
    #[serde(rename = "citedby-count")]
    citedby_count: Option<serde_json::Value>,
    #[serde(rename = "authkeywords")]
    keywords: Option<String>,
    #[serde(rename = "dc:identifier")]
    identifier: Option<String>,
    eid: Option<String>,
}

/// Normalize a batch of raw entries.
///
/// Entry-level failures never fail the batch: a malformed entry is logged
/// and skipped, and normalization continues with the rest.
#[must_use]
pub fn normalize_entries(entries: &[RawEntry]) -> Vec<Paper> {
    let mut papers = Vec::with_capacity(entries.len());

    for entry in entries {
        match normalize_entry(entry) {
            Ok(paper) => papers.push(paper),
            Err(e) => warn!("Skipping malformed entry: {}", e),
        }
    }

    papers
}

/// Normalize a single raw entry into a canonical paper
fn normalize_entry(entry: &RawEntry) -> Result<Paper> {
    let raw: ScopusEntry = serde_json::from_value(entry.clone()).map_err(|e| Error::Parse {
        context: "scopus entry".to_string(),
        message: e.to_string(),
    })?;

    let title = raw.title.unwrap_or_default();
    if title.trim().is_empty() {
        return Err(Error::Parse {
            context: "scopus entry".to_string(),
            message: "missing required title".to_string(),
        });
    }

    let authors: Vec<Author> = raw
        .authors
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|a| {
            let mut author = Author::new(a.name.unwrap_or_default(), a.affiliation);
            author.orcid = a.orcid;
            author
        })
        .collect();

    let mut paper = Paper::new(title, SOURCE.to_string());
    paper.author_uuids = authors.iter().map(|a| a.uuid).collect();
    paper.authors = authors;
    paper.abstract_text = raw.description;
    paper.publication_date = raw.cover_date.as_deref().and_then(parse_cover_date);
    paper.journal = raw.publication_name;
    paper.doi = raw.doi;
    paper.url = raw.url;
    paper.citations = Some(parse_citation_count(raw.citedby_count.as_ref()));
    paper.keywords = split_keywords(raw.keywords.as_deref());
    // dc:identifier arrives as "SCOPUS_ID:<id>"; strip the tag
    paper.source_id = raw
        .identifier
        .as_deref()
        .map(|id| id.strip_prefix("SCOPUS_ID:").unwrap_or(id).to_string());
    if let Some(eid) = raw.eid {
        paper
            .metadata
            .insert("eid".to_string(), serde_json::Value::String(eid));
    }

    Ok(paper)
}

/// Parse a cover date in strict `YYYY-MM-DD` form; failures are logged and
/// leave the paper undated rather than failing the entry
fn parse_cover_date(text: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warn!("Unparseable publication date: {:?}", text);
            None
        }
    }
}

/// Parse the string-encoded citation count; missing or unparseable values
/// default to 0
fn parse_citation_count(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// Split a comma-joined keyword string, trimming tokens, dropping empties and
/// deduplicating while preserving first occurrence
fn split_keywords(text: Option<&str>) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    if let Some(text) = text {
        for token in text.split(',') {
            let token = token.trim();
            if !token.is_empty() && !keywords.iter().any(|k| k == token) {
                keywords.push(token.to_string());
            }
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(title: &str) -> RawEntry {
        json!({
            "dc:title": title,
            "author": [
                {"authname": "A. One", "affilname": "Uni One"},
                {"authname": "B. Two"}
            ],
            "prism:coverDate": "2023-04-01",
            "prism:publicationName": "Journal of Tests",
            "prism:doi": "10.1000/test",
            "prism:url": "https://api.example.org/abstract/1",
            "citedby-count": "12",
            "authkeywords": "fire, smoke , , fire",
            "dc:identifier": "SCOPUS_ID:85000000001",
            "eid": "2-s2.0-85000000001"
        })
    }

    #[test]
    fn full_entry_normalizes() {
        let papers = normalize_entries(&[entry("A Paper")]);
        assert_eq!(papers.len(), 1);
        let paper = &papers[0];

        assert_eq!(paper.title, "A Paper");
        assert_eq!(paper.authors.len(), 2);
        assert_eq!(paper.authors[0].name, "A. One");
        assert_eq!(paper.authors[0].affiliation.as_deref(), Some("Uni One"));
        assert_eq!(paper.authors[1].affiliation, None);
        assert_eq!(
            paper.publication_date,
            NaiveDate::from_ymd_opt(2023, 4, 1)
        );
        assert_eq!(paper.doi.as_deref(), Some("10.1000/test"));
        assert_eq!(paper.citations, Some(12));
        assert_eq!(paper.keywords, vec!["fire", "smoke"]);
        assert_eq!(paper.source, "scopus");
        assert_eq!(paper.source_id.as_deref(), Some("85000000001"));
        assert_eq!(
            paper.metadata.get("eid").and_then(|v| v.as_str()),
            Some("2-s2.0-85000000001")
        );
        assert_eq!(paper.author_uuids.len(), 2);
        assert_eq!(paper.author_uuids[0], paper.authors[0].uuid);
    }

    #[test]
    fn single_author_object_is_accepted() {
        let raw = json!({
            "dc:title": "Single Author",
            "author": {"authname": "Solo", "affilname": "Somewhere"}
        });
        let papers = normalize_entries(&[raw]);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].authors.len(), 1);
        assert_eq!(papers[0].authors[0].name, "Solo");
    }

    #[test]
    fn missing_author_name_becomes_empty_string() {
        let raw = json!({
            "dc:title": "Anonymous",
            "author": {"affilname": "Somewhere"}
        });
        let papers = normalize_entries(&[raw]);
        assert_eq!(papers[0].authors[0].name, "");
    }

    #[test]
    fn unparseable_date_yields_none() {
        let raw = json!({
            "dc:title": "Undated",
            "prism:coverDate": "April 2023"
        });
        let papers = normalize_entries(&[raw]);
        assert_eq!(papers.len(), 1);
        assert!(papers[0].publication_date.is_none());
    }

    #[test]
    fn citation_count_defaults_to_zero() {
        let raw = json!({
            "dc:title": "Uncited",
            "citedby-count": "not a number"
        });
        let papers = normalize_entries(&[raw]);
        assert_eq!(papers[0].citations, Some(0));

        let raw = json!({"dc:title": "No count"});
        let papers = normalize_entries(&[raw]);
        assert_eq!(papers[0].citations, Some(0));
    }

    #[test]
    fn malformed_entry_does_not_fail_batch() {
        let entries = vec![
            entry("First"),
            json!({"author": [{"authname": "No Title"}]}),
            entry("Second"),
            entry("Third"),
            entry("Fourth"),
        ];
        let papers = normalize_entries(&entries);
        assert_eq!(papers.len(), 4);
        // Output ordering mirrors input ordering
        assert_eq!(papers[0].title, "First");
        assert_eq!(papers[1].title, "Second");
        assert_eq!(papers[3].title, "Fourth");
    }

    #[test]
    fn fresh_uuids_per_ingestion() {
        let papers_a = normalize_entries(&[entry("Same")]);
        let papers_b = normalize_entries(&[entry("Same")]);
        assert_ne!(papers_a[0].uuid, papers_b[0].uuid);
    }
}
