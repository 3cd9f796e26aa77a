//! Error types for fetching and analysis runs.

use thiserror::Error;

/// Failure to retrieve games from an upstream chess server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("gave up after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) | FetchError::RateLimited => true,
            FetchError::Status(code) => *code == 408 || *code >= 500,
            _ => false,
        }
    }
}

/// Fatal failure of a whole analysis run.
#[derive(Debug, Error)]
pub enum LeakError {
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("failed to fetch games: {0}")]
    Fetch(#[from] FetchError),
}
