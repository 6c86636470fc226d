//! Peer time sync: hierarchical clock synchronization over UDP
//!
//! Nodes form a tree rooted at a designated leader. Each node measures its
//! offset to a lower-level peer with a SYNC_START / DELAY_REQUEST /
//! DELAY_RESPONSE exchange, takes level `source + 1`, and announces its own
//! estimate to everyone it is connected to.

pub mod core;
pub mod logging;
pub mod network;
pub mod node;
pub mod protocol;
pub mod sync;
pub mod time;

// Re-export commonly used items
pub use crate::core::{ClockEpoch, Error, NodeConfig, Result, SyncLevel};
pub use crate::node::{Node, NodeHandle, NodeStatus};
pub use crate::sync::TimeReading;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
