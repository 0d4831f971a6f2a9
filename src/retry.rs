// Rate-limit retry loop shared by the city lookup and the offer search.
// A 429 is retried with exponential backoff; any other status ends the loop.

use crate::transport::{ApiError, HttpRequest, HttpResponse, Transport};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The server answered with something other than 429.
    Completed { response: HttpResponse, attempts: u32 },
    /// Every attempt was rate limited.
    Exhausted { attempts: u32 },
}

// attempt is zero-based: 1s, 2s, 4s, 8s with the defaults
pub fn calculate_backoff(retry_attempt: u32, config: &RetryConfig) -> Duration {
    let base_backoff_ms = (config.initial_backoff_ms as f64
        * config.backoff_multiplier.powf(retry_attempt as f64))
    .min(config.max_backoff_ms as f64);

    let jitter = rand::random::<f64>() * config.jitter_factor * base_backoff_ms;
    let backoff_ms = base_backoff_ms * (1.0 - config.jitter_factor / 2.0) + jitter;

    Duration::from_millis(backoff_ms as u64)
}

/// Send `request` until it is not rate limited or `max_attempts` is spent.
///
/// Transport failures are returned immediately; they are never retried.
pub async fn send_with_backoff<T: Transport + ?Sized>(
    transport: &T,
    request: &HttpRequest,
    config: &RetryConfig,
    label: &str,
) -> Result<RetryOutcome, ApiError> {
    for attempt in 0..config.max_attempts {
        let response = transport.send(request).await?;

        if !response.is_rate_limited() {
            return Ok(RetryOutcome::Completed {
                response,
                attempts: attempt + 1,
            });
        }

        // no point sleeping after the last attempt
        if attempt + 1 < config.max_attempts {
            let wait = calculate_backoff(attempt, config);
            tracing::warn!(
                "Rate limit ({label}). Waiting {}ms before attempt {}...",
                wait.as_millis(),
                attempt + 2
            );
            tokio::time::sleep(wait).await;
        }
    }

    tracing::warn!(
        "Rate limit ({label}) persisted for {} attempts, giving up",
        config.max_attempts
    );
    Ok(RetryOutcome::Exhausted {
        attempts: config.max_attempts,
    })
}
