use std::env;
use std::time::Duration;

use chess_clients::chess_com::CHESS_COM_BASE_URL;
use chess_clients::lichess::LICHESS_BASE_URL;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub lichess_base_url: String,
    pub chess_com_base_url: String,
    pub fetch_timeout: Duration,
    /// How long the browser gets to answer one eval request.
    pub eval_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            lichess_base_url: env::var("LICHESS_BASE_URL")
                .unwrap_or_else(|_| LICHESS_BASE_URL.to_string()),
            chess_com_base_url: env::var("CHESS_COM_BASE_URL")
                .unwrap_or_else(|_| CHESS_COM_BASE_URL.to_string()),
            fetch_timeout: secs_var("FETCH_TIMEOUT_SECS", 15),
            eval_timeout: secs_var("EVAL_TIMEOUT_SECS", 30),
        }
    }
}

fn secs_var(name: &str, default: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
