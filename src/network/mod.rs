//! Network layer
//!
//! This module owns the UDP endpoint, the registry of connected peers, name
//! resolution for the bootstrap peer, and the dispatch of inbound datagrams
//! to the node's handlers.

mod connection;
mod dispatcher;
mod peers;
mod resolve;

pub use self::connection::{is_transient_udp_error, Transport};
pub use self::dispatcher::report;
pub use self::peers::PeerRegistry;
pub use self::resolve::{resolve_addr, resolve_host};
