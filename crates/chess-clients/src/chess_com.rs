use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use chess_core::pgn::parse_pgn;
use chess_core::Game;
use opening_leaks::{FetchError, GameSource};

use crate::cache::BodyCache;
use crate::gate::{RequestGate, CHESS_COM_SPACING};
use crate::retry::{check_status, transport_error, AttemptError, RetryPolicy, DEFAULT_REQUEST_TIMEOUT};
use crate::{endpoint, USER_AGENT};

pub const CHESS_COM_BASE_URL: &str = "https://api.chess.com";

pub struct ChessComClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    gate: Arc<RequestGate>,
    cache: Option<Arc<BodyCache>>,
}

impl ChessComClient {
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
            gate: Arc::new(RequestGate::new(CHESS_COM_SPACING)),
            cache: None,
        })
    }

    pub fn chess_com() -> Result<Self, FetchError> {
        Self::new(CHESS_COM_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
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

    /// Monthly archives that contain games, as (year, month), newest first.
    pub async fn fetch_archives(&self, username: &str) -> Result<Vec<(i32, u32)>, FetchError> {
        let player = username.to_lowercase();
        let url = endpoint(&self.base_url, &["pub", "player", player.as_str(), "games", "archives"])?.to_string();
        let body = self
            .get_cached(&url)
            .await?
            .ok_or_else(|| FetchError::UserNotFound(username.to_string()))?;

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("archive list: {e}")))?;

        let mut months: Vec<(i32, u32)> = data["archives"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|v| archive_month(v.as_str()?))
            .collect();

        months.sort_by(|a, b| b.cmp(a));
        Ok(months)
    }

    /// Standard rated games of one month, newest first. A missing month is
    /// empty rather than an error.
    pub async fn fetch_month(&self, username: &str, year: i32, month: u32) -> Result<Vec<Game>, FetchError> {
        let player = username.to_lowercase();
        let (year, month_path) = (year.to_string(), format!("{month:02}"));
        let segments = ["pub", "player", player.as_str(), "games", year.as_str(), month_path.as_str()];
        let url = endpoint(&self.base_url, &segments)?.to_string();
        let Some(body) = self.get_cached(&url).await? else {
            return Ok(vec![]);
        };

        let data: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("monthly archive: {e}")))?;

        let mut games: Vec<Game> = data["games"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(game_from_archive_entry)
            .collect();
        games.reverse();
        Ok(games)
    }

    /// Walk archives newest first until `max_games` games are collected.
    pub async fn fetch_user_games(&self, username: &str, max_games: usize) -> Result<Vec<Game>, FetchError> {
        let months = self.fetch_archives(username).await?;
        let mut games = Vec::new();

        for (year, month) in months {
            if games.len() >= max_games {
                break;
            }
            let batch = self.fetch_month(username, year, month).await?;
            tracing::debug!(username, year, month, games = batch.len(), "Fetched Chess.com month");
            games.extend(batch);
        }

        games.truncate(max_games);
        tracing::info!(username, games = games.len(), "Fetched Chess.com games");
        Ok(games)
    }

    /// `None` on 404.
    async fn get_cached(&self, url: &str) -> Result<Option<String>, FetchError> {
        if let Some(body) = self.cache.as_ref().and_then(|c| c.get(&url.to_string())) {
            return Ok(Some(body));
        }

        let body = self.policy.run("chess.com", || self.fetch_body(url)).await?;

        if let (Some(cache), Some(body)) = (&self.cache, &body) {
            cache.insert(url.to_string(), body.clone());
        }
        Ok(body)
    }

    async fn fetch_body(&self, url: &str) -> Result<Option<String>, AttemptError> {
        let _permit = self.gate.acquire().await?;

        let resp = self.client.get(url).send().await.map_err(transport_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp)?;
        resp.text().await.map(Some).map_err(transport_error)
    }
}

/// Archive URLs end in `/games/{year}/{month}`.
fn archive_month(url: &str) -> Option<(i32, u32)> {
    let mut parts = url.trim_end_matches('/').rsplit('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn game_from_archive_entry(entry: &Value) -> Option<Game> {
    if !entry.get("rated").and_then(Value::as_bool).unwrap_or(true) {
        return None;
    }
    if entry.get("rules").and_then(Value::as_str).unwrap_or("chess") != "chess" {
        return None;
    }

    let pgn = entry.get("pgn").and_then(Value::as_str)?;
    let id = entry
        .get("url")
        .and_then(Value::as_str)
        .and_then(|url| url.rsplit('/').next())
        .unwrap_or("");
    parse_pgn(pgn, id)
}

#[async_trait]
impl GameSource for ChessComClient {
    async fn fetch_games(&self, username: &str, max_games: usize) -> Result<Vec<Game>, FetchError> {
        self.fetch_user_games(username, max_games).await
    }
}
