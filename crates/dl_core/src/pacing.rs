use std::time::Duration;

/// Fixed pauses the pipeline inserts between provider calls, on top of the
/// per-client rate limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_topics: Duration,
    pub between_summaries: Duration,
    pub between_subcalls: Duration,
    pub between_materials: Duration,
    pub between_writes: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_topics: Duration::from_secs(1),
            between_summaries: Duration::from_millis(500),
            between_subcalls: Duration::from_millis(500),
            between_materials: Duration::from_secs(1),
            between_writes: Duration::from_millis(500),
        }
    }
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            between_topics: Duration::ZERO,
            between_summaries: Duration::ZERO,
            between_subcalls: Duration::ZERO,
            between_materials: Duration::ZERO,
            between_writes: Duration::ZERO,
        }
    }
}

pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
