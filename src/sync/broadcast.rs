use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::protocol::Message;
use super::state::SyncState;

/// Periodic SYNC_START announcements to every registered peer
pub struct BroadcastScheduler {
    ticker: Interval,
}

impl BroadcastScheduler {
    /// Creates a scheduler whose first tick is one period from now
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        BroadcastScheduler { ticker }
    }

    /// Waits for the next broadcast tick. Cancel safe.
    pub async fn tick(&mut self) -> Instant {
        self.ticker.tick().await
    }

    /// The SYNC_START to send, if this node has anything to announce
    pub fn announcement(state: &SyncState, natural_ms: u64) -> Option<Message> {
        if !state.is_announcing() {
            return None;
        }
        let reading = state.reading(natural_ms);
        Some(Message::SyncStart {
            level: reading.level,
            timestamp: reading.timestamp,
        })
    }
}

/// Periodic liveness check of the current time source
pub struct StalenessMonitor {
    ticker: Interval,
    threshold: Duration,
}

impl StalenessMonitor {
    pub fn new(check_interval: Duration, threshold: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + check_interval, check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        StalenessMonitor { ticker, threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Waits for the next check. Cancel safe.
    pub async fn tick(&mut self) -> Instant {
        self.ticker.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SyncLevel;
    use crate::protocol::LeaderState;

    #[test]
    fn test_unsynchronized_node_is_silent() {
        let state = SyncState::new();
        assert_eq!(BroadcastScheduler::announcement(&state, 1000), None);
    }

    #[test]
    fn test_leader_announces_level_zero() {
        let mut state = SyncState::new();
        state.apply_leader(LeaderState::Begin, Instant::now(), Duration::from_secs(20));

        assert_eq!(
            BroadcastScheduler::announcement(&state, 1234),
            Some(Message::SyncStart {
                level: SyncLevel::LEADER,
                timestamp: 1234
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let start = Instant::now();
        let mut scheduler = BroadcastScheduler::new(Duration::from_secs(5));

        scheduler.tick().await;
        let first = start.elapsed();
        assert!(first >= Duration::from_secs(5) && first < Duration::from_secs(6));
        scheduler.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
