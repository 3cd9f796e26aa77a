//! Leak analysis against a native Stockfish.

pub mod config;
pub mod error;
pub mod stockfish;

use std::sync::Arc;

use chess_clients::{ChessComClient, LichessClient};
use opening_leaks::GameSource;

use crate::config::WorkerConfig;
use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    Lichess,
    Chesscom,
}

/// Build the HTTP client for `kind` from the worker settings.
pub fn game_source(kind: SourceKind, config: &WorkerConfig) -> Result<Arc<dyn GameSource>, WorkerError> {
    let source: Arc<dyn GameSource> = match kind {
        SourceKind::Lichess => Arc::new(LichessClient::new(&config.lichess_base_url, config.fetch_timeout)?),
        SourceKind::Chesscom => Arc::new(ChessComClient::new(&config.chess_com_base_url, config.fetch_timeout)?),
    };
    Ok(source)
}
