//! Lightweight regex-based PGN parsing for Chess.com archive games.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::game_data::{Game, GameResult};
use crate::moves::STARTING_FEN;

struct PgnPatterns {
    header: Regex,
    comment: Regex,
    variation: Regex,
    san: Regex,
}

fn patterns() -> &'static PgnPatterns {
    static PATTERNS: OnceLock<PgnPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| PgnPatterns {
        header: Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("static regex"),
        comment: Regex::new(r"\{[^}]*\}").expect("static regex"),
        variation: Regex::new(r"\([^)]*\)").expect("static regex"),
        san: Regex::new(r"O-O-O|O-O|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?").expect("static regex"),
    })
}

/// Parse a PGN string into a `Game`.
///
/// Games that start from a custom position, or that carry no moves, are
/// rejected. `id` is the caller's identifier for the game (Chess.com uses the
/// game URL).
pub fn parse_pgn(pgn: &str, id: &str) -> Option<Game> {
    let headers = headers(pgn);

    if headers.get("SetUp").map(String::as_str) == Some("1") {
        if let Some(fen) = headers.get("FEN") {
            if fen != STARTING_FEN {
                return None;
            }
        }
    }

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return None;
    }

    let header = |key: &str| headers.get(key).cloned().unwrap_or_default();

    Some(Game {
        id: id.to_string(),
        white: header("White"),
        black: header("Black"),
        moves,
        result: GameResult::from_pgn(&header("Result")),
    })
}

fn headers(pgn: &str) -> HashMap<String, String> {
    patterns()
        .header
        .captures_iter(pgn)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Vec<String> {
    let p = patterns();
    let no_headers = p.header.replace_all(pgn, "");
    let no_comments = p.comment.replace_all(&no_headers, "");
    let no_variations = p.variation.replace_all(&no_comments, "");

    p.san
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}
