//! Game source clients against an in-process upstream.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use chess_clients::{BodyCache, ChessComClient, LichessClient, RequestGate, RetryPolicy};
use opening_leaks::{FetchError, GameSource};

use common::*;

const FAST: RetryPolicy = RetryPolicy {
    max_retries: 3,
    base_delay: Duration::ZERO,
};

fn lichess(base: &str) -> LichessClient {
    LichessClient::new(base, Duration::from_secs(5))
        .unwrap()
        .with_retry_policy(FAST)
        .with_gate(Arc::new(RequestGate::new(Duration::ZERO)))
}

fn chess_com(base: &str) -> ChessComClient {
    ChessComClient::new(base, Duration::from_secs(5))
        .unwrap()
        .with_retry_policy(FAST)
        .with_gate(Arc::new(RequestGate::new(Duration::ZERO)))
}

/// Lichess stand-in that fails with `status` for the first `failures` calls.
fn flaky_lichess(failures: u32, status: StatusCode, hits: Arc<AtomicU32>) -> Router {
    Router::new()
        .route(
            "/api/games/user/{username}",
            get(
                move |State(hits): State<Arc<AtomicU32>>, Path(username): Path<String>, headers: HeaderMap| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if username == "ghost" {
                        return StatusCode::NOT_FOUND.into_response();
                    }
                    if n < failures {
                        return (status, [("retry-after", "0")]).into_response();
                    }
                    let accept = headers
                        .get("accept")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    if accept != "application/x-ndjson" {
                        return StatusCode::NOT_ACCEPTABLE.into_response();
                    }
                    let body = format!("{}\n{{broken json\n", scenario_ndjson());
                    body.into_response()
                },
            ),
        )
        .with_state(hits)
}

#[tokio::test]
async fn test_lichess_parses_ndjson_and_drops_bad_lines() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(0, StatusCode::OK, hits.clone())).await;

    let games = lichess(&base).fetch_games(USER, 50).await.unwrap();

    assert_eq!(games.len(), 6);
    assert_eq!(games[0].id, "g1");
    assert_eq!(games[1].white, " hero ");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(2, StatusCode::SERVICE_UNAVAILABLE, hits.clone())).await;

    let games = lichess(&base).fetch_games(USER, 50).await.unwrap();

    assert_eq!(games.len(), 6);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(100, StatusCode::TOO_MANY_REQUESTS, hits.clone())).await;

    let err = lichess(&base).fetch_games(USER, 50).await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert_eq!(*last, FetchError::RateLimited);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(100, StatusCode::FORBIDDEN, hits.clone())).await;

    let err = lichess(&base).fetch_games(USER, 50).await.unwrap_err();
    assert_eq!(err, FetchError::Status(403));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_user() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(0, StatusCode::OK, hits)).await;

    let err = lichess(&base).fetch_games("ghost", 50).await.unwrap_err();
    assert_eq!(err, FetchError::UserNotFound("ghost".into()));
}

#[tokio::test]
async fn test_username_cannot_rewrite_the_request() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(0, StatusCode::OK, hits.clone())).await;
    let client = lichess(&base);

    // Both would resolve to the unknown user "ghost" if pasted into the path.
    for username in ["ghost?max=1&x=", "../user/ghost"] {
        let games = client.fetch_games(username, 50).await.unwrap();
        assert_eq!(games.len(), 6, "{username}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cached_body_skips_upstream() {
    let hits = Arc::new(AtomicU32::new(0));
    let base = serve(flaky_lichess(0, StatusCode::OK, hits.clone())).await;
    let client = lichess(&base).with_cache(Arc::new(BodyCache::new(Duration::from_secs(60))));

    let first = client.fetch_games(USER, 50).await.unwrap();
    let second = client.fetch_games(USER, 50).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_host_is_a_network_failure() {
    // Nothing listens on the discard port.
    let err = lichess("http://127.0.0.1:9").fetch_games(USER, 10).await.unwrap_err();
    match err {
        FetchError::RetriesExhausted { last, .. } => {
            assert!(matches!(*last, FetchError::Network(_) | FetchError::Timeout(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

fn pgn(white: &str, black: &str, moves: &str) -> String {
    format!("[Event \"Live Chess\"]\n[White \"{white}\"]\n[Black \"{black}\"]\n[Result \"*\"]\n\n{moves} *")
}

fn chess_com_upstream() -> Router {
    async fn archives(Path(user): Path<String>) -> Response {
        if user != "hero" {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(json!({
            "archives": [
                "https://api.chess.com/pub/player/hero/games/2024/01",
                "https://api.chess.com/pub/player/hero/games/2024/03",
                "https://api.chess.com/pub/player/hero/games/2024/02",
            ]
        }))
        .into_response()
    }

    async fn month(Path((_user, year, month)): Path<(String, i32, String)>) -> Response {
        let games = match (year, month.as_str()) {
            (2024, "03") => json!([
                { "url": "https://www.chess.com/game/live/31", "rated": true, "rules": "chess",
                  "pgn": pgn("Hero", "a", "1. e4 e5") },
                { "url": "https://www.chess.com/game/live/32", "rated": false, "rules": "chess",
                  "pgn": pgn("Hero", "b", "1. d4 d5") },
                { "url": "https://www.chess.com/game/live/33", "rated": true, "rules": "chess",
                  "pgn": pgn("Hero", "c", "1. c4 e5") },
            ]),
            (2024, "02") => json!([
                { "url": "https://www.chess.com/game/live/21", "rated": true, "rules": "chess960",
                  "pgn": pgn("Hero", "d", "1. e4 e5") },
                { "url": "https://www.chess.com/game/live/22", "rated": true, "rules": "chess",
                  "pgn": pgn("e", "Hero", "1. Nf3 d5") },
            ]),
            (2024, "01") => json!([
                { "url": "https://www.chess.com/game/live/11", "rated": true, "rules": "chess",
                  "pgn": pgn("Hero", "f", "1. g3 d5") },
            ]),
            _ => return StatusCode::NOT_FOUND.into_response(),
        };
        Json(json!({ "games": games })).into_response()
    }

    Router::new()
        .route("/pub/player/{user}/games/archives", get(archives))
        .route("/pub/player/{user}/games/{year}/{month}", get(month))
}

#[tokio::test]
async fn test_chess_com_walks_archives_newest_first() {
    let base = serve(chess_com_upstream()).await;
    let client = chess_com(&base);

    let games = client.fetch_games("Hero", 10).await.unwrap();
    let ids: Vec<&str> = games.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["33", "31", "22", "11"]);

    let games = client.fetch_games("Hero", 2).await.unwrap();
    let ids: Vec<&str> = games.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["33", "31"]);
}

#[tokio::test]
async fn test_chess_com_unknown_user() {
    let base = serve(chess_com_upstream()).await;
    let err = chess_com(&base).fetch_games("ghost", 10).await.unwrap_err();
    assert_eq!(err, FetchError::UserNotFound("ghost".into()));
}
