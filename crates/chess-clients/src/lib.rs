//! Upstream game sources: Lichess and Chess.com HTTP clients with retry,
//! request spacing and an optional response cache.

pub mod cache;
pub mod chess_com;
pub mod clock;
pub mod gate;
pub mod lichess;
pub mod retry;

pub use cache::{BodyCache, ResponseCache};
pub use chess_com::ChessComClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::RequestGate;
pub use lichess::LichessClient;
pub use retry::RetryPolicy;

use opening_leaks::FetchError;
use reqwest::Url;

pub(crate) const USER_AGENT: &str = "FireChess/1.0";

/// `base_url` with `segments` appended as escaped path segments.
pub(crate) fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, FetchError> {
    let invalid = || FetchError::Network(format!("Invalid upstream URL: {base_url}"));
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_escapes_segments() {
        let url = endpoint("http://127.0.0.1:8080", &["api", "games", "user", "a?max=1&x="]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/games/user/a%3Fmax=1&x=");

        let url = endpoint("https://api.chess.com/", &["pub", "player", "../admin", "games"]).unwrap();
        assert_eq!(url.as_str(), "https://api.chess.com/pub/player/..%2Fadmin/games");

        assert!(endpoint("not a url", &["x"]).is_err());
    }
}
