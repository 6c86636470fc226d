//! Core types shared by the synchronization engine
//!
//! This module contains the error taxonomy, the sync level type, peer records
//! and node configuration used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{DecodeError, Error, Result};
pub use self::types::{ClockEpoch, NodeConfig, Peer, SyncLevel};

/// Default port for the synchronization protocol (0 lets the OS pick)
pub const DEFAULT_PORT: u16 = 0;

/// Maximum datagram size accepted from the socket
pub const MAX_PACKET_SIZE: usize = 65535;

/// Number of leading datagram bytes dumped in error reports
pub const REPORT_PREFIX_LEN: usize = 10;
