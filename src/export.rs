//! JSON export of ingestion results.
//!
//! The envelope mirrors what the pipeline knew at run time (rendered query,
//! year bounds, source) so an exported file is self-describing without the
//! catalog that produced it.

use crate::models::Paper;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Self-describing export envelope around one batch of papers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub papers: Vec<Paper>,
    /// Number of papers in the envelope
    pub count: usize,
    /// Rendered query string the batch was fetched with
    pub query: String,
    /// Export time, UTC
    pub timestamp: DateTime<Utc>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub source: String,
}

impl ResultEnvelope {
    #[must_use]
    pub fn new(
        papers: Vec<Paper>,
        query: String,
        source: String,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) -> Self {
        Self {
            count: papers.len(),
            papers,
            query,
            timestamp: Utc::now(),
            start_year,
            end_year,
            source,
        }
    }

    /// File name for this envelope: `{source}_{timestamp}.json`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.source, self.timestamp.format("%Y%m%d_%H%M%S"))
    }

    /// Write the envelope as pretty-printed JSON into `dir`, creating the
    /// directory if needed. Returns the path written.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self).map_err(Error::Serde)?;
        std::fs::write(&path, json)?;
        info!("Exported {} papers to {}", self.count, path.display());
        Ok(path)
    }
}
