//! Worker error types

use thiserror::Error;

use opening_leaks::FetchError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stockfish error: {0}")]
    Stockfish(String),

    #[error("Client error: {0}")]
    Client(#[from] FetchError),
}
