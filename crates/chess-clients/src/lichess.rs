use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use chess_core::records::parse_ndjson;
use chess_core::Game;
use opening_leaks::{FetchError, GameSource};

use crate::cache::BodyCache;
use crate::gate::{RequestGate, LICHESS_SPACING};
use crate::retry::{check_status, transport_error, AttemptError, RetryPolicy, DEFAULT_REQUEST_TIMEOUT};
use crate::{endpoint, USER_AGENT};

pub const LICHESS_BASE_URL: &str = "https://lichess.org";

pub struct LichessClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    gate: Arc<RequestGate>,
    cache: Option<Arc<BodyCache>>,
}

impl LichessClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            gate: Arc::new(RequestGate::new(LICHESS_SPACING)),
            cache: None,
        })
    }

    pub fn lichess() -> Result<Self, FetchError> {
        Self::new(LICHESS_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gate(mut self, gate: Arc<RequestGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_cache(mut self, cache: Arc<BodyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetch a user's most recent games as NDJSON and parse them.
    /// Malformed lines are dropped.
    pub async fn fetch_user_games(&self, username: &str, max_games: usize) -> Result<Vec<Game>, FetchError> {
        let mut url = endpoint(&self.base_url, &["api", "games", "user", username])?;
        url.query_pairs_mut()
            .append_pair("max", &max_games.to_string())
            .append_pair("moves", "true")
            .append_pair("clocks", "false")
            .append_pair("evals", "false")
            .append_pair("opening", "false");
        let url = url.to_string();

        if let Some(body) = self.cache.as_ref().and_then(|c| c.get(&url)) {
            tracing::debug!(username, "Lichess response served from cache");
            return Ok(parse_ndjson(&body));
        }

        let body = self
            .policy
            .run("lichess games", || self.fetch_body(&url, username))
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(url, body.clone());
        }

        let games = parse_ndjson(&body);
        tracing::info!(username, games = games.len(), "Fetched Lichess games");
        Ok(games)
    }

    async fn fetch_body(&self, url: &str, username: &str) -> Result<String, AttemptError> {
        let _permit = self.gate.acquire().await?;

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::UserNotFound(username.to_string()).into());
        }
        let resp = check_status(resp)?;
        resp.text().await.map_err(transport_error)
    }
}

#[async_trait]
impl GameSource for LichessClient {
    async fn fetch_games(&self, username: &str, max_games: usize) -> Result<Vec<Game>, FetchError> {
        self.fetch_user_games(username, max_games).await
    }
}
