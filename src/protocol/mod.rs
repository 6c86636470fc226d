//! Protocol implementation module
//!
//! This module defines the protocol messages and their fixed-size big-endian
//! wire format.

pub mod codec;
pub mod message;

pub use self::codec::{decode, encode, WireCodec};
pub use self::message::{LeaderState, Message, MessageType};

/// Largest encoded message
pub const MAX_MESSAGE_SIZE: usize = 10;
