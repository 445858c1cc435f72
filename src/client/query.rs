//! Provider query assembly.
//!
//! A [`SearchQueryBuilder`] collects free search terms, required inclusions,
//! exclusions and raw boolean constraints, plus an optional year range, and
//! renders them into the provider's boolean query syntax. It performs no I/O.
//!
//! A term belongs to exactly one of {free, included, excluded} at any time:
//! adding a term to one category removes it from the others, and removal is
//! mirrored across all three.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};

/// Accepted inputs for the year-range bounds
#[derive(Debug, Clone)]
pub enum DateInput {
    /// A bare year, interpreted as January 1st
    Year(i32),
    /// A concrete calendar date
    Date(NaiveDate),
    /// A parseable date string: `YYYY-MM-DD` or a bare year
    Text(String),
}

impl From<i32> for DateInput {
    fn from(year: i32) -> Self {
        DateInput::Year(year)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(date: NaiveDate) -> Self {
        DateInput::Date(date)
    }
}

impl From<&str> for DateInput {
    fn from(text: &str) -> Self {
        DateInput::Text(text.to_string())
    }
}

impl From<String> for DateInput {
    fn from(text: String) -> Self {
        DateInput::Text(text)
    }
}

impl DateInput {
    fn resolve(self) -> Result<NaiveDate> {
        match self {
            DateInput::Year(year) => NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| {
                Error::InvalidInput {
                    field: "date".to_string(),
                    reason: format!("invalid year: {year}"),
                }
            }),
            DateInput::Date(date) => Ok(date),
            DateInput::Text(text) => {
                let trimmed = text.trim();
                if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    return Ok(date);
                }
                if let Ok(year) = trimmed.parse::<i32>() {
                    return DateInput::Year(year).resolve();
                }
                Err(Error::InvalidInput {
                    field: "date".to_string(),
                    reason: format!("expected YYYY-MM-DD or a year, got {trimmed:?}"),
                })
            }
        }
    }
}

/// Wrap a term in double quotes when exact matching is requested or the term
/// contains whitespace or commas; already-quoted terms are left alone
fn format_phrase(term: &str, exact: bool) -> String {
    let trimmed = term.trim();
    let already_quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
    if already_quoted {
        return trimmed.to_string();
    }
    if exact || trimmed.chars().any(|c| c.is_whitespace() || c == ',') {
        format!("\"{trimmed}\"")
    } else {
        trimmed.to_string()
    }
}

/// Builder for provider search queries
#[derive(Debug, Clone, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
    inclusions: Vec<String>,
    exclusions: Vec<String>,
    constraints: Vec<String>,
    after_date: Option<NaiveDate>,
    before_date: Option<NaiveDate>,
}

impl SearchQueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a free search term. `exact` forces phrase matching.
    pub fn add_term(&mut self, term: &str, exact: bool) -> &mut Self {
        let phrase = format_phrase(term, exact);
        Self::purge(&mut self.inclusions, term);
        Self::purge(&mut self.exclusions, term);
        if !phrase.is_empty() && !self.terms.contains(&phrase) {
            self.terms.push(phrase);
        }
        self
    }

    /// Add multiple free search terms with a shared exact flag
    pub fn add_terms<'a, I: IntoIterator<Item = &'a str>>(
        &mut self,
        terms: I,
        exact: bool,
    ) -> &mut Self {
        for term in terms {
            self.add_term(term, exact);
        }
        self
    }

    /// Add a term that results are required to contain
    pub fn add_inclusion(&mut self, term: &str, exact: bool) -> &mut Self {
        let phrase = format_phrase(term, exact);
        Self::purge(&mut self.terms, term);
        Self::purge(&mut self.exclusions, term);
        if !phrase.is_empty() && !self.inclusions.contains(&phrase) {
            self.inclusions.push(phrase);
        }
        self
    }

    /// Add a term that results must not contain
    pub fn add_exclusion(&mut self, term: &str, exact: bool) -> &mut Self {
        let phrase = format_phrase(term, exact);
        Self::purge(&mut self.terms, term);
        Self::purge(&mut self.inclusions, term);
        if !phrase.is_empty() && !self.exclusions.contains(&phrase) {
            self.exclusions.push(phrase);
        }
        self
    }

    /// Add a raw boolean constraint appended verbatim to the rendered query
    pub fn add_constraint(&mut self, constraint: &str) -> &mut Self {
        let trimmed = constraint.trim().to_string();
        if !trimmed.is_empty() && !self.constraints.contains(&trimmed) {
            self.constraints.push(trimmed);
        }
        self
    }

    /// Remove a term from whichever category currently holds it
    pub fn remove(&mut self, term: &str) -> &mut Self {
        Self::purge(&mut self.terms, term);
        Self::purge(&mut self.inclusions, term);
        Self::purge(&mut self.exclusions, term);
        self
    }

    /// Remove a raw constraint
    pub fn remove_constraint(&mut self, constraint: &str) -> &mut Self {
        self.constraints.retain(|c| c != constraint.trim());
        self
    }

    /// Restrict results to papers published in or after the given bound
    pub fn after(&mut self, date: impl Into<DateInput>) -> Result<&mut Self> {
        self.after_date = Some(date.into().resolve()?);
        Ok(self)
    }

    /// Restrict results to papers published in or before the given bound
    pub fn before(&mut self, date: impl Into<DateInput>) -> Result<&mut Self> {
        self.before_date = Some(date.into().resolve()?);
        Ok(self)
    }

    /// Start year of the range, if set
    #[must_use]
    pub fn start_year(&self) -> Option<i32> {
        self.after_date.map(|d| d.year())
    }

    /// End year of the range, if set
    #[must_use]
    pub fn end_year(&self) -> Option<i32> {
        self.before_date.map(|d| d.year())
    }

    /// True when no terms, inclusions, exclusions or constraints are present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
            && self.inclusions.is_empty()
            && self.exclusions.is_empty()
            && self.constraints.is_empty()
    }

    /// Render the provider query string.
    ///
    /// Free terms and inclusions are AND-joined, exclusions are negated, raw
    /// constraints pass through, and year bounds become the provider's
    /// `PUBYEAR` comparisons.
    #[must_use]
    pub fn render(&self) -> String {
        let mut clauses: Vec<String> = Vec::new();

        clauses.extend(self.terms.iter().cloned());
        clauses.extend(self.inclusions.iter().cloned());
        clauses.extend(self.exclusions.iter().map(|t| format!("NOT {t}")));
        clauses.extend(self.constraints.iter().cloned());

        if let Some(start) = self.start_year() {
            clauses.push(format!("PUBYEAR > {}", start - 1));
        }
        if let Some(end) = self.end_year() {
            clauses.push(format!("PUBYEAR < {}", end + 1));
        }

        clauses.join(" AND ")
    }

    // Drops every stored variant of `term`: raw, flexible and exact forms.
    fn purge(list: &mut Vec<String>, term: &str) {
        let flexible = format_phrase(term, false);
        let exact = format_phrase(term, true);
        list.retain(|t| t != term && *t != flexible && *t != exact);
    }
}
