//! Local time keeping
//!
//! Every node owns a natural clock counting milliseconds. Unsynchronized
//! nodes and leaders report it directly; synchronized nodes report it
//! corrected by the offset learned from their source.

mod clock;

pub use self::clock::NaturalClock;

/// Utility functions for time arithmetic
pub mod util {
    /// Applies a learned offset (local minus source) to a natural reading
    ///
    /// Results before the epoch clamp to zero.
    pub fn apply_offset(natural_ms: u64, offset_ms: i64) -> u64 {
        let corrected = natural_ms as i128 - offset_ms as i128;
        corrected.clamp(0, u64::MAX as i128) as u64
    }

    /// Signed difference `a - b` in milliseconds
    pub fn signed_diff(a: u64, b: u64) -> i128 {
        a as i128 - b as i128
    }
}
