use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;

use opening_leaks::FetchError;

use crate::clock::{Clock, SystemClock};

/// Lichess asks for one request at a time, roughly a second apart.
pub const LICHESS_SPACING: Duration = Duration::from_secs(1);
pub const CHESS_COM_SPACING: Duration = Duration::from_millis(100);

/// Serializes calls to one upstream and keeps them a minimum interval apart.
///
/// Share one gate (behind an `Arc`) between every client talking to the same
/// host.
pub struct RequestGate {
    permits: Semaphore,
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            permits: Semaphore::new(1),
            min_interval,
            last_start: Mutex::new(None),
            clock,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for our turn. The returned permit must be held for the duration
    /// of the request.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Network("request gate closed".to_string()))?;

        let wait = {
            let last = self.last_start.lock().unwrap_or_else(|e| e.into_inner());
            (*last).map(|t| (t + self.min_interval).saturating_duration_since(self.clock.now()))
        };
        if let Some(wait) = wait.filter(|w| !w.is_zero()) {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Request gate spacing");
            tokio::time::sleep(wait).await;
        }

        *self.last_start.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.clock.now());
        Ok(permit)
    }
}
