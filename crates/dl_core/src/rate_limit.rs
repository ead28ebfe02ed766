use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum interval between calls made through one client.
/// Each client owns its own limiter; nothing is shared unless the caller
/// shares the limiter explicitly.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Limiter derived from a requests-per-minute budget. A zero budget
    /// disables the limit.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        if requests_per_minute == 0 {
            return Self::unlimited();
        }
        Self::new(Duration::from_secs_f64(60.0 / f64::from(requests_per_minute)))
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the minimum interval since the previous call has elapsed,
    /// then record this call.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval - elapsed;
                debug!(delay_ms = delay.as_millis() as u64, "rate limiting");
                tokio::time::sleep(delay).await;
            }
        }
        *last = Some(Instant::now());
    }
}
