//! Newline-delimited JSON game records.
//!
//! Each line is one game with a space-separated `moves` string. Player names
//! come either from Lichess-style `players.{white,black}.user` objects or from
//! flat `white`/`black` strings. Lines that fail to parse are dropped.

use serde_json::Value;

use crate::game_data::{Game, GameResult};

/// Parse a whole NDJSON body, keeping every line that yields a game.
pub fn parse_ndjson(body: &str) -> Vec<Game> {
    let mut games = Vec::new();

    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(record) => match game_from_record(&record) {
                Some(game) => games.push(game),
                None => {
                    tracing::warn!(line = line_no + 1, "Dropping game record without moves or players");
                }
            },
            Err(e) => {
                tracing::warn!(line = line_no + 1, "Failed to parse game record JSON: {e}");
            }
        }
    }

    games
}

/// Build a game from one decoded record.
pub fn game_from_record(record: &Value) -> Option<Game> {
    let moves: Vec<String> = record
        .get("moves")
        .and_then(|v| v.as_str())?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if moves.is_empty() {
        return None;
    }

    let white = player_name(record, "white")?;
    let black = player_name(record, "black")?;

    let id = record
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(Game {
        id,
        white,
        black,
        moves,
        result: record_result(record),
    })
}

fn player_name(record: &Value, side: &str) -> Option<String> {
    let nested = record
        .get("players")
        .and_then(|p| p.get(side))
        .and_then(|p| p.get("user"))
        .and_then(|u| u.get("name").or_else(|| u.get("id")))
        .and_then(|v| v.as_str());

    let flat = || record.get(side).and_then(|v| v.as_str());

    nested
        .or_else(flat)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
}

fn record_result(record: &Value) -> GameResult {
    match record.get("winner").and_then(|v| v.as_str()) {
        Some("white") => return GameResult::WhiteWin,
        Some("black") => return GameResult::BlackWin,
        _ => {}
    }

    if let Some(result) = record.get("result").and_then(|v| v.as_str()) {
        return GameResult::from_pgn(result);
    }

    match record.get("status").and_then(|v| v.as_str()) {
        Some("draw") | Some("stalemate") => GameResult::Draw,
        // Finished with no winner (e.g. timeout vs insufficient material)
        Some("outoftime") | Some("timeout") => GameResult::Draw,
        _ => GameResult::Unfinished,
    }
}
