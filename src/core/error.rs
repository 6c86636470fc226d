use std::io;
use thiserror::Error;

/// Wire-level decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("bad payload length for {kind}: expected {expected} bytes, got {actual}")]
    BadPayloadLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid leader state {0}")]
    InvalidLeaderState(u8),
}

/// Custom error types for the synchronization engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer error: {0}")]
    Peer(String),

    #[error("Timing error: {0}")]
    Timing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synchronization error: {0}")]
    Sync(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new peer error
    pub fn peer(msg: impl Into<String>) -> Self {
        Error::Peer(msg.into())
    }

    /// Creates a new timing error
    pub fn timing(msg: impl Into<String>) -> Self {
        Error::Timing(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new synchronization error
    pub fn sync(msg: impl Into<String>) -> Self {
        Error::Sync(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::protocol("orphaned DELAY_RESPONSE");
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(err.to_string(), "Protocol error: orphaned DELAY_RESPONSE");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = DecodeError::UnknownType(100).into();
        assert!(matches!(err, Error::Decode(DecodeError::UnknownType(100))));
        assert_eq!(err.to_string(), "Decode error: unknown message type 100");
    }

    #[test]
    fn test_bad_length_message() {
        let err = DecodeError::BadPayloadLength {
            kind: "SYNC_START",
            expected: 9,
            actual: 5,
        };
        assert_eq!(
            err.to_string(),
            "bad payload length for SYNC_START: expected 9 bytes, got 5"
        );
    }
}
