use crate::config::ProviderConfig;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Maximum jitter as fraction of the delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            multiplier: 1.5,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Derive retry behavior from the provider section of the configuration
    #[must_use]
    pub fn from_provider(provider: &ProviderConfig) -> Self {
        Self {
            max_attempts: provider.retry_count.max(1),
            initial_delay: provider.retry_base_delay(),
            multiplier: provider.retry_backoff,
            ..Self::default()
        }
    }
}

/// Execute an operation, retrying transient failures with exponential backoff.
///
/// Errors categorized as permanent propagate immediately without another
/// attempt; rate-limit errors honor the provider-suggested delay when one is
/// available.
pub async fn retry_with_config<T, F, Fut>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        debug!(
            "Executing operation '{}' (attempt {})",
            operation_name, attempt
        );

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded after {} attempts",
                        operation_name, attempt
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                if !error.is_retryable() {
                    debug!(
                        "Operation '{}' failed with non-retryable error: {}",
                        operation_name, error
                    );
                    return Err(error);
                }

                if attempt >= config.max_attempts {
                    warn!(
                        "Operation '{}' failed after {} attempts: {}",
                        operation_name, attempt, error
                    );
                    return Err(error);
                }

                let delay = calculate_delay(attempt - 1, config, &error);
                debug!(
                    "Operation '{}' failed (attempt {}), retrying after {:?}: {}",
                    operation_name, attempt, delay, error
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Calculate delay for a retry attempt: `initial * multiplier^attempt`,
/// capped and jittered
fn calculate_delay(attempt: u32, config: &RetryConfig, error: &Error) -> Duration {
    // Use error-specific delay if available (e.g., Retry-After)
    if let Some(retry_after) = error.retry_after() {
        return retry_after.min(config.max_delay);
    }

    let base_delay_ms = config.initial_delay.as_millis() as f64;
    let exponential_delay_ms = base_delay_ms * config.multiplier.powi(attempt as i32);
    let capped_delay_ms = exponential_delay_ms.min(config.max_delay.as_millis() as f64);
    let delay = Duration::from_millis(capped_delay_ms as u64);

    add_jitter(delay, config.jitter)
}

/// Add jitter to prevent thundering herd against the provider
fn add_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    let jitter = rng.gen_range(0..=jitter_ms);

    delay + Duration::from_millis(jitter)
}
