use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{Error, Result};

/// Distance in synchronization hops from the root time source
///
/// 0 is the leader, 255 means unsynchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncLevel(pub u8);

impl SyncLevel {
    /// The leader's level
    pub const LEADER: SyncLevel = SyncLevel(0);

    /// Level of a node with no time source
    pub const UNSYNCHRONIZED: SyncLevel = SyncLevel(255);

    /// Returns the raw level
    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn is_synchronized(&self) -> bool {
        *self != Self::UNSYNCHRONIZED
    }

    /// Level of a node that synchronizes to a source at this level
    ///
    /// Saturates below 255: a source at 254 or 255 cannot produce a valid level.
    pub fn next(&self) -> Option<SyncLevel> {
        if self.0 < Self::UNSYNCHRONIZED.0 - 1 {
            Some(SyncLevel(self.0 + 1))
        } else {
            None
        }
    }
}

impl fmt::Display for SyncLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synchronized() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("unsynchronized")
        }
    }
}

/// A registered peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// The peer's network address
    pub addr: SocketAddr,
    /// When the peer's CONNECT (or our ACK) was accepted
    pub connected_at: Instant,
}

impl Peer {
    pub fn new(addr: SocketAddr, connected_at: Instant) -> Self {
        Peer { addr, connected_at }
    }
}

/// Origin of the natural clock reported by unsynchronized nodes and leaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockEpoch {
    /// Milliseconds since the node started
    #[default]
    ProcessStart,
    /// Milliseconds since the Unix epoch
    Unix,
}

/// Configuration for a synchronization node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Local address to bind to
    pub bind_addr: SocketAddr,
    /// Peer to send CONNECT to at startup
    #[serde(serialize_with = "super::serde::serialize_opt_addr")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_addr")]
    #[serde(default)]
    pub bootstrap_peer: Option<SocketAddr>,
    /// Period of SYNC_START announcements
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub broadcast_interval: Duration,
    /// How often the source's liveness is checked
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub staleness_check_interval: Duration,
    /// Silence after which the time source is dropped
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub staleness_threshold: Duration,
    /// Bound on a SYNC_START -> DELAY_RESPONSE exchange
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub sync_timeout: Duration,
    /// Origin of the natural clock
    #[serde(default)]
    pub clock_epoch: ClockEpoch,
    /// Receive buffer size
    pub recv_buf_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], super::DEFAULT_PORT)),
            bootstrap_peer: None,
            broadcast_interval: Duration::from_secs(5),
            staleness_check_interval: Duration::from_secs(1),
            staleness_threshold: Duration::from_secs(20),
            sync_timeout: Duration::from_secs(5),
            clock_epoch: ClockEpoch::ProcessStart,
            recv_buf_size: super::MAX_PACKET_SIZE,
        }
    }
}

impl NodeConfig {
    /// Checks that the timer settings are consistent with each other
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("broadcast_interval", self.broadcast_interval),
            ("staleness_check_interval", self.staleness_check_interval),
            ("staleness_threshold", self.staleness_threshold),
            ("sync_timeout", self.sync_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::config(format!("{} must be non-zero", name)));
            }
        }

        if self.staleness_threshold <= self.broadcast_interval {
            return Err(Error::config(
                "staleness_threshold must exceed broadcast_interval",
            ));
        }
        if self.staleness_check_interval >= self.broadcast_interval {
            return Err(Error::config(
                "staleness_check_interval must be shorter than broadcast_interval",
            ));
        }
        if self.sync_timeout >= self.staleness_threshold {
            return Err(Error::config(
                "sync_timeout must be shorter than staleness_threshold",
            ));
        }
        if self.recv_buf_size == 0 {
            return Err(Error::config("recv_buf_size must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_level_next() {
        assert_eq!(SyncLevel::LEADER.next(), Some(SyncLevel(1)));
        assert_eq!(SyncLevel(253).next(), Some(SyncLevel(254)));
        assert_eq!(SyncLevel(254).next(), None);
        assert_eq!(SyncLevel::UNSYNCHRONIZED.next(), None);
    }

    #[test]
    fn test_sync_level_display() {
        assert_eq!(SyncLevel(3).to_string(), "3");
        assert_eq!(SyncLevel::UNSYNCHRONIZED.to_string(), "unsynchronized");
        assert!(!SyncLevel::UNSYNCHRONIZED.is_synchronized());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.clock_epoch, ClockEpoch::ProcessStart);
    }

    #[test]
    fn test_config_validation() {
        let config = NodeConfig {
            staleness_threshold: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = NodeConfig {
            staleness_check_interval: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NodeConfig {
            sync_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json() {
        let json = r#"{
            "bind_addr": "127.0.0.1:12345",
            "bootstrap_peer": "127.0.0.1:12346",
            "broadcast_interval": 2.0,
            "staleness_check_interval": 0.5,
            "staleness_threshold": 10.0,
            "sync_timeout": 1.0,
            "clock_epoch": "unix",
            "recv_buf_size": 1024
        }"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bootstrap_peer, Some("127.0.0.1:12346".parse().unwrap()));
        assert_eq!(config.broadcast_interval, Duration::from_secs(2));
        assert_eq!(config.clock_epoch, ClockEpoch::Unix);
        assert!(config.validate().is_ok());
    }
}
