//! Move token handling: UCI/SAN parsing against a position, FEN round trips,
//! and the per-move facts the leak tagger looks at.

use std::sync::OnceLock;

use regex::Regex;
use shakmaty::{
    fen::Fen, san::San, san::SanPlus, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move,
    Position, Role, Square,
};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const CENTER: [Square; 4] = [Square::D4, Square::E4, Square::D5, Square::E5];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("unrecognized move token: {0}")]
    Unrecognized(String),

    #[error("illegal move {token} in {fen}")]
    Illegal { token: String, fen: String },

    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

fn uci_pattern() -> &'static Regex {
    static UCI: OnceLock<Regex> = OnceLock::new();
    UCI.get_or_init(|| Regex::new(r"^[a-h][1-8][a-h][1-8][qrbn]?$").expect("static regex"))
}

/// True when the token has coordinate (UCI) shape, e.g. `e2e4` or `e7e8q`.
pub fn is_uci_token(token: &str) -> bool {
    uci_pattern().is_match(token)
}

/// Resolve a move token against `pos`.
///
/// Coordinate tokens are tried as UCI; everything else must be SAN (check and
/// mate suffixes allowed). The returned move is always legal in `pos`.
pub fn parse_move_token(pos: &Chess, token: &str) -> Result<Move, MoveError> {
    let token = token.trim();
    let illegal = || MoveError::Illegal {
        token: token.to_string(),
        fen: fen_of(pos),
    };

    if is_uci_token(token) {
        let uci: UciMove = token
            .parse()
            .map_err(|_| MoveError::Unrecognized(token.to_string()))?;
        return uci.to_move(pos).map_err(|_| illegal());
    }

    let san_plus: SanPlus = token
        .parse()
        .map_err(|_| MoveError::Unrecognized(token.to_string()))?;
    san_plus.san.to_move(pos).map_err(|_| illegal())
}

/// Parse and play a token, returning the move and the resulting position.
pub fn apply_token(pos: &Chess, token: &str) -> Result<(Move, Chess), MoveError> {
    let mv = parse_move_token(pos, token)?;
    let next = play(pos, &mv);
    Ok((mv, next))
}

/// Play a move already known to be legal in `pos`.
pub fn play(pos: &Chess, mv: &Move) -> Chess {
    let mut next = pos.clone();
    next.play_unchecked(mv.clone());
    next
}

pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn position_from_fen(fen: &str) -> Result<Chess, MoveError> {
    let parsed: Fen = fen
        .parse()
        .map_err(|_| MoveError::InvalidFen(fen.to_string()))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|_| MoveError::InvalidFen(fen.to_string()))
}

pub fn san_of(pos: &Chess, mv: &Move) -> String {
    San::from_move(pos, mv.clone()).to_string()
}

pub fn uci_of(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Full-move number of the position (starts at 1, bumps after Black moves).
pub fn fullmove_number(pos: &Chess) -> u32 {
    pos.fullmoves().get()
}

/// What a single move does on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveFacts {
    pub castles: bool,
    pub gives_check: bool,
    pub captures: bool,
    pub lands_in_center: bool,
    pub moves_queen_or_king: bool,
}

pub fn move_facts(pos: &Chess, mv: &Move) -> MoveFacts {
    let castles = mv.is_castle();
    MoveFacts {
        castles,
        gives_check: play(pos, mv).is_check(),
        captures: mv.is_capture(),
        lands_in_center: !castles && CENTER.contains(&mv.to()),
        moves_queen_or_king: !castles && matches!(mv.role(), Role::Queen | Role::King),
    }
}
