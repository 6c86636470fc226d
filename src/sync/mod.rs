//! Synchronization module
//!
//! This module holds the node's sync state and everything that mutates it:
//! the per-source delay measurement, the leadership controller, and the
//! periodic broadcast and staleness timers.

pub mod broadcast;
pub mod leader;
pub mod measurement;
pub mod state;

pub use self::broadcast::{BroadcastScheduler, StalenessMonitor};
pub use self::leader::LeaderTransition;
pub use self::measurement::{DelayMeasurement, Measurement, PendingSyncAttempt};
pub use self::state::{Acceptance, Adoption, SyncState, TimeReading, TimeSource};
