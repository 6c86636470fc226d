use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

use crate::core::ClockEpoch;

/// The node's own millisecond clock, before any learned offset
///
/// Readings are monotonic: the Unix epoch is sampled once and advanced with
/// a monotonic instant afterwards.
#[derive(Debug, Clone)]
pub struct NaturalClock {
    started: Instant,
    base_ms: u64,
}

impl NaturalClock {
    pub fn new(epoch: ClockEpoch) -> Self {
        let base_ms = match epoch {
            ClockEpoch::ProcessStart => 0,
            ClockEpoch::Unix => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_millis() as u64,
        };

        NaturalClock {
            started: Instant::now(),
            base_ms,
        }
    }

    /// Current reading in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.at_ms(Instant::now())
    }

    /// Reading at a given instant
    pub fn at_ms(&self, instant: Instant) -> u64 {
        let elapsed = instant.saturating_duration_since(self.started);
        self.base_ms.saturating_add(elapsed.as_millis() as u64)
    }
}
