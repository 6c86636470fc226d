//! Leadership control
//!
//! LEADER is an administrative command and is not gated by the peer
//! registry. Both directions are idempotent.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::protocol::LeaderState;
use super::state::SyncState;

/// Effect of a LEADER command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderTransition {
    /// The node became the root time source
    Began,
    /// The node stepped down
    Stopped,
    /// Already in the requested role
    Unchanged,
}

impl SyncState {
    /// Applies a LEADER command
    ///
    /// `staleness_threshold` bounds how old a stashed source may be to be
    /// restored on STOP.
    pub fn apply_leader(
        &mut self,
        command: LeaderState,
        now: Instant,
        staleness_threshold: Duration,
    ) -> LeaderTransition {
        match command {
            LeaderState::Begin => self.begin_leadership(),
            LeaderState::Stop => self.stop_leadership(now, staleness_threshold),
        }
    }

    fn begin_leadership(&mut self) -> LeaderTransition {
        if self.is_leader {
            return LeaderTransition::Unchanged;
        }
        self.stashed = self.source.take();
        self.is_leader = true;
        info!("leadership begun, sync level 0");
        LeaderTransition::Began
    }

    fn stop_leadership(&mut self, now: Instant, staleness_threshold: Duration) -> LeaderTransition {
        if !self.is_leader {
            return LeaderTransition::Unchanged;
        }
        self.is_leader = false;
        self.source = self
            .stashed
            .take()
            .filter(|s| now.saturating_duration_since(s.last_seen) <= staleness_threshold);
        info!("leadership stopped, sync level {}", self.level());
        LeaderTransition::Stopped
    }
}
