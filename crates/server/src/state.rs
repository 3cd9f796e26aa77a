use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use chess_clients::{BodyCache, ChessComClient, LichessClient};
use opening_leaks::{FetchError, GameSource};

use crate::config::Config;

/// Upstream responses are reused for this long.
const RESPONSE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Lichess,
    #[serde(alias = "chess.com", alias = "chess_com")]
    Chesscom,
}

/// Shared by every request. Clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub eval_timeout: Duration,
    lichess: Arc<dyn GameSource>,
    chess_com: Arc<dyn GameSource>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let cache = Arc::new(BodyCache::new(RESPONSE_TTL));
        let lichess = LichessClient::new(&config.lichess_base_url, config.fetch_timeout)?
            .with_cache(cache.clone());
        let chess_com = ChessComClient::new(&config.chess_com_base_url, config.fetch_timeout)?
            .with_cache(cache);

        Ok(Self::new(Arc::new(lichess), Arc::new(chess_com), config.eval_timeout))
    }

    pub fn new(lichess: Arc<dyn GameSource>, chess_com: Arc<dyn GameSource>, eval_timeout: Duration) -> Self {
        Self {
            eval_timeout,
            lichess,
            chess_com,
        }
    }

    pub fn source(&self, source: Source) -> &dyn GameSource {
        match source {
            Source::Lichess => self.lichess.as_ref(),
            Source::Chesscom => self.chess_com.as_ref(),
        }
    }
}
