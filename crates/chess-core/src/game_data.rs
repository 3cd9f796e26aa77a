use serde::{Deserialize, Serialize};

/// Which side a player had in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl From<Side> for shakmaty::Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => shakmaty::Color::White,
            Side::Black => shakmaty::Color::Black,
        }
    }
}

/// Final result of a game as recorded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    Unfinished,
}

impl GameResult {
    /// Parse a PGN result tag ("1-0", "0-1", "1/2-1/2", "*").
    pub fn from_pgn(result: &str) -> Self {
        match result.trim() {
            "1-0" => GameResult::WhiteWin,
            "0-1" => GameResult::BlackWin,
            "1/2-1/2" => GameResult::Draw,
            _ => GameResult::Unfinished,
        }
    }
}

/// Result of a game seen from one player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

/// One played game as fetched from an upstream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub white: String,
    pub black: String,
    /// Move tokens in play order, SAN or UCI.
    pub moves: Vec<String>,
    pub result: GameResult,
}

impl Game {
    /// Side the given user played, matching names case-insensitively after
    /// trimming. `None` when neither player matches.
    pub fn user_side(&self, username: &str) -> Option<Side> {
        let wanted = normalize_username(username);
        if wanted.is_empty() {
            return None;
        }
        if normalize_username(&self.white) == wanted {
            Some(Side::White)
        } else if normalize_username(&self.black) == wanted {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// Outcome for the player on `side`, or `None` if the game never finished.
    pub fn outcome_for(&self, side: Side) -> Option<Outcome> {
        match (self.result, side) {
            (GameResult::Draw, _) => Some(Outcome::Draw),
            (GameResult::WhiteWin, Side::White) | (GameResult::BlackWin, Side::Black) => {
                Some(Outcome::Win)
            }
            (GameResult::WhiteWin, Side::Black) | (GameResult::BlackWin, Side::White) => {
                Some(Outcome::Loss)
            }
            (GameResult::Unfinished, _) => None,
        }
    }
}

pub fn normalize_username(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(white: &str, black: &str, result: GameResult) -> Game {
        Game {
            id: "g1".into(),
            white: white.into(),
            black: black.into(),
            moves: vec!["e4".into()],
            result,
        }
    }

    #[test]
    fn test_user_side_is_case_and_whitespace_insensitive() {
        let g = game("  MagnusFan ", "opponent", GameResult::Draw);
        assert_eq!(g.user_side("magnusfan"), Some(Side::White));
        assert_eq!(g.user_side("OPPONENT "), Some(Side::Black));
        assert_eq!(g.user_side("someone_else"), None);
        assert_eq!(g.user_side("   "), None);
    }

    #[test]
    fn test_outcome_for_each_side() {
        let g = game("a", "b", GameResult::WhiteWin);
        assert_eq!(g.outcome_for(Side::White), Some(Outcome::Win));
        assert_eq!(g.outcome_for(Side::Black), Some(Outcome::Loss));

        let g = game("a", "b", GameResult::Unfinished);
        assert_eq!(g.outcome_for(Side::White), None);
    }

    #[test]
    fn test_result_from_pgn() {
        assert_eq!(GameResult::from_pgn("1-0"), GameResult::WhiteWin);
        assert_eq!(GameResult::from_pgn("0-1"), GameResult::BlackWin);
        assert_eq!(GameResult::from_pgn("1/2-1/2"), GameResult::Draw);
        assert_eq!(GameResult::from_pgn("*"), GameResult::Unfinished);
    }
}
