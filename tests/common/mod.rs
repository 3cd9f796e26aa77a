#![allow(dead_code)]

use axum::Router;
use serde_json::json;

use chess_core::records::parse_ndjson;
use chess_core::Game;
use opening_leaks::ScriptedEvaluator;

pub const USER: &str = "Hero";

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
pub const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
pub const AFTER_NF3: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2";

/// One Lichess-style NDJSON line.
pub fn record(id: &str, white: &str, black: &str, moves: &str, winner: Option<&str>) -> String {
    let mut value = json!({
        "id": id,
        "status": if winner.is_some() { "resign" } else { "draw" },
        "players": {
            "white": { "user": { "name": white } },
            "black": { "user": { "name": black } },
        },
        "moves": moves,
    });
    if let Some(winner) = winner {
        value["winner"] = json!(winner);
    }
    value.to_string()
}

/// Five games for Hero. Three reach the position after 1.e4 e5 with Hero to
/// move, and Hero answers 2.Nf3 every time. One more game belongs to
/// strangers.
pub fn scenario_ndjson() -> String {
    [
        record("g1", "Hero", "villain", "e4 e5 Nf3 Nc6 Bc4", Some("white")),
        record("g2", " hero ", "rival", "e2e4 e7e5 g1f3 g8f6", None),
        record("g3", "HERO", "villain", "e4 e5 Nf3 d6 d4", Some("black")),
        record("g4", "Hero", "rival", "d4 d5 c4", Some("white")),
        record("g5", "villain", "Hero", "e4 c5 Nf3", Some("black")),
        record("x1", "alice", "bob", "e4 e5 Nf3 Nc6", Some("white")),
    ]
    .join("\n")
}

pub fn scenario_games() -> Vec<Game> {
    parse_ndjson(&scenario_ndjson())
}

/// Engine answers for the scenario. From Hero's side: the start position is
/// fine (+20 before, +25 after 1.e4) while 2.Nf3 drops from +30 to -90.
pub fn scenario_evaluator() -> ScriptedEvaluator {
    ScriptedEvaluator::new()
        .with(START, 20, Some("e2e4"))
        .with(AFTER_E4, -25, Some("e7e5"))
        .with(AFTER_E4_E5, 30, Some("d2d4"))
        .with(AFTER_NF3, 90, Some("b8c6"))
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
