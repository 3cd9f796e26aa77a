//! Chess primitives shared by the FireChess crates: the game model, move
//! token handling on top of shakmaty, and upstream record parsing.

pub mod game_data;
pub mod moves;
pub mod pgn;
pub mod records;

pub use game_data::{Game, GameResult, Outcome, Side};
pub use moves::MoveError;
