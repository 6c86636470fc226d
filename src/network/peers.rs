use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use tokio::time::Instant;

use crate::core::Peer;

/// Addresses trusted to exchange synchronization traffic with this node
///
/// Peers are never evicted: there is no disconnect message, so the registry
/// only grows for the lifetime of the process.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    /// Registered peers keyed by address
    peers: HashMap<SocketAddr, Peer>,
    /// Addresses we sent CONNECT to and expect an ACK_CONNECT from
    awaiting_ack: HashSet<SocketAddr>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `addr`, keeping the original record if already known
    ///
    /// Returns true if the peer was new.
    pub fn register(&mut self, addr: SocketAddr, now: Instant) -> bool {
        self.awaiting_ack.remove(&addr);
        if self.peers.contains_key(&addr) {
            return false;
        }
        self.peers.insert(addr, Peer::new(addr, now));
        true
    }

    pub fn is_known(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    /// Records an outbound CONNECT
    pub fn expect_ack(&mut self, addr: SocketAddr) {
        if !self.peers.contains_key(&addr) {
            self.awaiting_ack.insert(addr);
        }
    }

    /// Handles an ACK_CONNECT from `addr`
    ///
    /// Returns false if we never sent CONNECT there and the peer is unknown.
    pub fn acknowledge(&mut self, addr: SocketAddr, now: Instant) -> bool {
        if self.awaiting_ack.remove(&addr) {
            self.register(addr, now);
            true
        } else {
            self.peers.contains_key(&addr)
        }
    }

    /// Returns all registered peers
    pub fn all(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Number of peers, saturated to fit a HELLO_REPLY
    pub fn reply_count(&self) -> u16 {
        u16::try_from(self.peers.len()).unwrap_or(u16::MAX)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
