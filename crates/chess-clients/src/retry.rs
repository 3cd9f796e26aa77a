//! Retry with exponential backoff for upstream HTTP calls.

use std::future::Future;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

use opening_leaks::FetchError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Longest `Retry-After` we honour; larger values wait this long instead.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// One failed attempt, with the server's requested delay if it sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub error: FetchError,
    pub retry_after: Option<Duration>,
}

impl From<FetchError> for AttemptError {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(requested) => requested.min(MAX_RETRY_AFTER),
            None => self.base_delay * 2u32.saturating_pow(attempt),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of retries.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempt = 0u32;
        loop {
            let failure = match op().await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.error.is_transient() {
                return Err(failure.error);
            }
            if attempt >= self.max_retries {
                tracing::warn!(what, attempts = attempt + 1, error = %failure.error, "Giving up");
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(failure.error),
                });
            }

            let delay = self.delay_for(attempt, failure.retry_after);
            tracing::debug!(
                what,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "Retrying upstream request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Map a transport error onto the fetch taxonomy.
pub fn transport_error(err: reqwest::Error) -> AttemptError {
    let error = if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else if err.is_decode() || err.is_body() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    };
    error.into()
}

/// Integer-seconds `Retry-After`. HTTP-date values are ignored.
pub fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Turn a non-success status into an attempt error. 404 is left to the
/// caller, whose meaning differs per endpoint.
pub fn check_status(resp: Response) -> Result<Response, AttemptError> {
    let status = resp.status();
    if status.is_success() || status == StatusCode::NOT_FOUND {
        return Ok(resp);
    }
    let error = if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited
    } else {
        FetchError::Status(status.as_u16())
    };
    Err(AttemptError {
        error,
        retry_after: retry_after(&resp),
    })
}
