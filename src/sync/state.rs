use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::core::SyncLevel;
use crate::time::util::apply_offset;
use super::measurement::Measurement;

/// The peer this node currently takes its time from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSource {
    /// Address of the source
    pub addr: SocketAddr,
    /// Our level while following this source
    pub level: SyncLevel,
    /// Learned offset, local natural clock minus source clock
    pub offset_ms: i64,
    /// Last successful measurement against the source
    pub last_seen: Instant,
}

/// A (level, time) pair as reported by TIME, DELAY_RESPONSE and SYNC_START
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReading {
    pub level: SyncLevel,
    pub timestamp: u64,
}

/// What to do with an announcement from a registered peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Start a delay measurement
    Accept,
    /// This node is the leader and follows nobody
    IgnoreLeader,
    /// The announced level would not improve on ours
    IgnoreLevel,
}

/// Result of applying a finished measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adoption {
    /// The node's level changed
    Changed,
    /// Same level, source refreshed
    Refreshed,
    /// State moved on while the measurement was in flight
    Rejected,
}

/// The node's single authoritative view of its synchronization
///
/// Invariants: a leader has level 0 and no source; an unsynchronized node
/// has no source; any level in 1..=254 has a source.
#[derive(Debug)]
pub struct SyncState {
    pub(super) source: Option<TimeSource>,
    pub(super) is_leader: bool,
    /// Source set aside while this node leads
    pub(super) stashed: Option<TimeSource>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// Creates an unsynchronized, non-leader state
    pub fn new() -> Self {
        SyncState {
            source: None,
            is_leader: false,
            stashed: None,
        }
    }

    pub fn level(&self) -> SyncLevel {
        if self.is_leader {
            SyncLevel::LEADER
        } else {
            self.source
                .as_ref()
                .map_or(SyncLevel::UNSYNCHRONIZED, |s| s.level)
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    pub fn source(&self) -> Option<&TimeSource> {
        self.source.as_ref()
    }

    /// Whether this node should announce itself to its peers
    pub fn is_announcing(&self) -> bool {
        self.is_leader || self.level().is_synchronized()
    }

    /// Current level and best time estimate given a natural clock reading
    pub fn reading(&self, natural_ms: u64) -> TimeReading {
        let timestamp = match (&self.source, self.is_leader) {
            (Some(source), false) => apply_offset(natural_ms, source.offset_ms),
            _ => natural_ms,
        };
        TimeReading {
            level: self.level(),
            timestamp,
        }
    }

    /// Decides whether a SYNC_START from a registered peer starts a measurement
    ///
    /// A leader follows nobody. A source at level 254 or above is never
    /// followed: 254 + 1 would collide with the unsynchronized marker, and
    /// levels are not saturated down to 254 because that would hide the
    /// node behind a valid-looking level. The current source is accepted
    /// while it stays below our level; any other peer only when following
    /// it strictly improves our level, so a node never adopts its own
    /// descendants.
    pub fn evaluate_announcement(&self, from: SocketAddr, declared: SyncLevel) -> Acceptance {
        if self.is_leader {
            return Acceptance::IgnoreLeader;
        }
        let Some(candidate) = declared.next() else {
            return Acceptance::IgnoreLevel;
        };

        let own = self.level();
        let from_source = self.source.as_ref().is_some_and(|s| s.addr == from);
        let improves = if from_source {
            declared < own
        } else {
            candidate < own
        };

        if improves {
            Acceptance::Accept
        } else {
            Acceptance::IgnoreLevel
        }
    }

    /// Applies a successful delay measurement
    pub fn adopt(&mut self, measurement: &Measurement, now: Instant) -> Adoption {
        if self.is_leader {
            return Adoption::Rejected;
        }

        let previous = self.level();
        let from_source = self
            .source
            .as_ref()
            .is_some_and(|s| s.addr == measurement.source);
        if !from_source && measurement.level >= previous {
            return Adoption::Rejected;
        }

        self.source = Some(TimeSource {
            addr: measurement.source,
            level: measurement.level,
            offset_ms: measurement.offset_ms,
            last_seen: now,
        });

        if measurement.level == previous {
            Adoption::Refreshed
        } else {
            info!(
                source = %measurement.source,
                "sync level {} -> {}",
                previous,
                measurement.level
            );
            Adoption::Changed
        }
    }

    /// Drops a source that has been silent for longer than `threshold`
    ///
    /// Returns the dropped source.
    pub fn expire_stale(&mut self, now: Instant, threshold: Duration) -> Option<TimeSource> {
        let stale = self
            .source
            .as_ref()
            .is_some_and(|s| now.saturating_duration_since(s.last_seen) > threshold);
        if stale {
            self.source.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn measurement(port: u16, level: u8, offset_ms: i64) -> Measurement {
        Measurement {
            source: addr(port),
            level: SyncLevel(level),
            offset_ms,
            delay_ms: 0,
        }
    }

    #[test]
    fn test_fresh_state() {
        let state = SyncState::new();
        assert_eq!(state.level(), SyncLevel::UNSYNCHRONIZED);
        assert!(!state.is_announcing());
        assert_eq!(
            state.reading(3000),
            TimeReading {
                level: SyncLevel::UNSYNCHRONIZED,
                timestamp: 3000
            }
        );
    }

    #[test]
    fn test_adopt_sets_level_and_offset() {
        let mut state = SyncState::new();
        let now = Instant::now();

        assert_eq!(state.adopt(&measurement(1, 1, -500), now), Adoption::Changed);
        assert_eq!(state.level(), SyncLevel(1));
        assert!(state.is_announcing());
        assert_eq!(state.reading(1000).timestamp, 1500);
        assert_eq!(state.source().unwrap().addr, addr(1));

        assert_eq!(state.adopt(&measurement(1, 1, -400), now), Adoption::Refreshed);
        assert_eq!(state.reading(1000).timestamp, 1400);
    }

    #[test]
    fn test_adopt_rejects_worse_foreign_source() {
        let mut state = SyncState::new();
        let now = Instant::now();
        state.adopt(&measurement(1, 2, 0), now);

        assert_eq!(state.adopt(&measurement(2, 3, 0), now), Adoption::Rejected);
        assert_eq!(state.adopt(&measurement(2, 2, 0), now), Adoption::Rejected);
        assert_eq!(state.adopt(&measurement(2, 1, 0), now), Adoption::Changed);
        assert_eq!(state.source().unwrap().addr, addr(2));
    }

    #[test]
    fn test_evaluate_announcement() {
        let mut state = SyncState::new();
        assert_eq!(state.evaluate_announcement(addr(1), SyncLevel(0)), Acceptance::Accept);
        assert_eq!(state.evaluate_announcement(addr(1), SyncLevel(253)), Acceptance::Accept);
        assert_eq!(
            state.evaluate_announcement(addr(1), SyncLevel(254)),
            Acceptance::IgnoreLevel
        );
        assert_eq!(
            state.evaluate_announcement(addr(1), SyncLevel::UNSYNCHRONIZED),
            Acceptance::IgnoreLevel
        );

        state.adopt(&measurement(1, 2, 0), Instant::now());
        // Current source may keep or improve its level
        assert_eq!(state.evaluate_announcement(addr(1), SyncLevel(1)), Acceptance::Accept);
        assert_eq!(state.evaluate_announcement(addr(1), SyncLevel(2)), Acceptance::IgnoreLevel);
        // Others must strictly improve on us
        assert_eq!(state.evaluate_announcement(addr(2), SyncLevel(1)), Acceptance::IgnoreLevel);
        assert_eq!(state.evaluate_announcement(addr(2), SyncLevel(0)), Acceptance::Accept);
        // Our own children never qualify
        assert_eq!(state.evaluate_announcement(addr(3), SyncLevel(2)), Acceptance::IgnoreLevel);
    }

    #[test]
    fn test_expire_stale() {
        let mut state = SyncState::new();
        let seen = Instant::now();
        state.adopt(&measurement(1, 1, 0), seen);

        let threshold = Duration::from_secs(20);
        assert!(state.expire_stale(seen + Duration::from_secs(20), threshold).is_none());
        assert_eq!(state.level(), SyncLevel(1));

        let dropped = state.expire_stale(seen + Duration::from_secs(21), threshold);
        assert_eq!(dropped.map(|s| s.addr), Some(addr(1)));
        assert_eq!(state.level(), SyncLevel::UNSYNCHRONIZED);
        assert!(state.source().is_none());
    }
}
