//! Scopus search provider: paginated fetching against the Scopus Search API
//! and normalization of its entry shape.

use super::traits::{FetchOutcome, FetchStatus, RawEntry, SearchRequest, SourceProvider};
use crate::config::ProviderConfig;
use crate::ingest::normalize::normalize_entries;
use crate::models::Paper;
use crate::resilience::{retry_with_config, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the Scopus API key
const API_KEY_HEADER: &str = "X-ELS-APIKey";

/// Scopus API provider
pub struct ScopusProvider {
    client: Client,
    api_url: String,
    api_key: String,
    max_results_per_request: u32,
    rate_limit_pause: Duration,
    retry: RetryConfig,
    request_timeout: Duration,
}

impl ScopusProvider {
    /// Create a new Scopus provider from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::MissingCredential("SCOPUS_API_KEY".to_string()));
        }
        if config.api_url.trim().is_empty() {
            return Err(Error::MissingCredential("SCOPUS_API_URL".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            max_results_per_request: config.max_results_per_request.max(1),
            rate_limit_pause: config.rate_limit_pause(),
            retry: RetryConfig::from_provider(config),
            request_timeout: config.timeout(),
        })
    }

    /// Query parameters for one page request
    fn page_params(&self, query: &str, count: u32, start: u32) -> [(String, String); 4] {
        [
            ("query".to_string(), query.to_string()),
            ("count".to_string(), count.to_string()),
            ("start".to_string(), start.to_string()),
            // Complete record information, including abstracts and keywords
            ("view".to_string(), "COMPLETE".to_string()),
        ]
    }

    /// Issue a single page request and extract its raw entries
    async fn request_page(&self, query: &str, count: u32, start: u32) -> Result<Vec<RawEntry>> {
        debug!("Requesting results {}..{} from Scopus", start, start + count);

        let response = self
            .client
            .get(&self.api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .query(&self.page_params(query, count, start))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::NetworkTimeout {
                        timeout: self.request_timeout,
                        message: e.to_string(),
                    }
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => Error::RateLimitExceeded {
                    retry_after: Duration::from_secs(60),
                },
                401 | 403 => Error::AuthenticationFailed(format!(
                    "Scopus rejected the API key: HTTP {status}"
                )),
                code => Error::Provider {
                    code,
                    message: body.chars().take(200).collect(),
                },
            });
        }

        let body: serde_json::Value = response.json().await?;

        let Some(entries) = body
            .get("search-results")
            .and_then(|r| r.get("entry"))
            .and_then(|e| e.as_array())
        else {
            warn!("No entries found in Scopus response");
            return Ok(Vec::new());
        };

        Ok(entries.clone())
    }
}

#[async_trait]
impl SourceProvider for ScopusProvider {
    fn name(&self) -> &str {
        "scopus"
    }

    /// Fetch raw entries in strictly increasing offset order.
    ///
    /// Pagination stops when the requested maximum is reached, a page comes
    /// back empty, or a page is shorter than requested (last page). Transient
    /// request failures are retried with exponential backoff; a permanent
    /// failure or exhausted retries degrade the outcome to partial instead of
    /// discarding what was already fetched.
    async fn fetch_raw(&self, request: &SearchRequest) -> Result<FetchOutcome> {
        let page_size = request
            .page_size
            .min(self.max_results_per_request)
            .max(1);

        let mut entries: Vec<RawEntry> = Vec::new();
        let mut offset: u32 = 0;
        let mut requests: u32 = 0;

        let status = loop {
            if offset >= request.max_results {
                break FetchStatus::Complete;
            }

            // Never ask for more than the remaining result budget
            let count = page_size.min(request.max_results - offset);

            let page = retry_with_config(
                || self.request_page(&request.query, count, offset),
                &self.retry,
                "scopus_page",
            )
            .await;

            let page_entries = match page {
                Ok(page_entries) => page_entries,
                Err(e) => {
                    warn!(
                        "Pagination aborted at offset {} after {} entries: {}",
                        offset,
                        entries.len(),
                        e
                    );
                    break FetchStatus::Partial {
                        reason: e.to_string(),
                    };
                }
            };
            requests += 1;

            if page_entries.is_empty() {
                break FetchStatus::Complete;
            }

            let got = page_entries.len() as u32;
            entries.extend(page_entries);
            offset += got;

            // A short page signals the last page
            if got < count {
                break FetchStatus::Complete;
            }
            if offset >= request.max_results {
                break FetchStatus::Complete;
            }

            // Respect the provider quota between successful requests
            if !self.rate_limit_pause.is_zero() {
                tokio::time::sleep(self.rate_limit_pause).await;
            }
        };

        info!(
            "Fetched {} raw entries from Scopus in {} requests ({})",
            entries.len(),
            requests,
            if status.is_complete() {
                "complete"
            } else {
                "partial"
            }
        );

        Ok(FetchOutcome {
            entries,
            status,
            requests,
        })
    }

    fn parse_results(&self, entries: &[RawEntry]) -> Vec<Paper> {
        normalize_entries(entries)
    }
}
