//! Worker configuration from environment variables

use std::env;
use std::time::Duration;

use chess_clients::chess_com::CHESS_COM_BASE_URL;
use chess_clients::lichess::LICHESS_BASE_URL;

use crate::error::WorkerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,
    pub hash_mb: u32,
    pub threads: u32,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub engine: EngineConfig,
    pub lichess_base_url: String,
    pub chess_com_base_url: String,
    pub fetch_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WorkerError> {
        let engine = EngineConfig {
            stockfish_path: env::var("STOCKFISH_PATH")
                .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string()),
            hash_mb: parsed_var("STOCKFISH_HASH_MB", 256)?,
            threads: parsed_var("STOCKFISH_THREADS", 1)?,
        };

        Ok(Self {
            engine,
            lichess_base_url: env::var("LICHESS_BASE_URL")
                .unwrap_or_else(|_| LICHESS_BASE_URL.to_string()),
            chess_com_base_url: env::var("CHESS_COM_BASE_URL")
                .unwrap_or_else(|_| CHESS_COM_BASE_URL.to_string()),
            fetch_timeout: Duration::from_secs(parsed_var("FETCH_TIMEOUT_SECS", 15)?),
        })
    }
}

/// A set-but-unparseable value is an error rather than silently defaulted.
fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, WorkerError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("{name} is not a valid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
