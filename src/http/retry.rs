//! Retry policy for downloads: which failures are worth another attempt.

use reqwest::StatusCode;

/// Maximum number of attempts per download.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Errors that should not be retried.
#[derive(Debug, thiserror::Error)]
pub enum NonRetryableError {
    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}. Try again later.")]
    RateLimitExceeded(String),
    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Authentication required or refused (HTTP 401/403)
    #[error("Access denied: {0}")]
    AccessDenied(String),
    /// Other client errors that won't succeed on retry
    #[error("Request error: {0}")]
    ClientError(String),
}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is retryable.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors, timeouts, etc.
        return Ok(());
    };
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "request".to_string());

    match status {
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NonRetryableError::AccessDenied(
            format!("{} returned HTTP {}", url, status.as_u16()),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(url)),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "{} returned HTTP {}",
            url,
            s.as_u16()
        ))),
        // 5xx server errors are retryable
        _ => Ok(()),
    }
}

/// Maps an error from `error_for_status()` to either the original error
/// (retryable) or a [`NonRetryableError`].
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
