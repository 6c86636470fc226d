use crate::core::SyncLevel;

/// Message type tags as they appear in the first byte of a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Hello = 1,
    HelloReply = 2,
    Connect = 3,
    AckConnect = 4,
    SyncStart = 11,
    DelayRequest = 12,
    DelayResponse = 13,
    Leader = 21,
    GetTime = 31,
    Time = 32,
}

impl MessageType {
    /// Maps a tag byte to its message type
    pub fn from_byte(byte: u8) -> Option<Self> {
        let kind = match byte {
            1 => MessageType::Hello,
            2 => MessageType::HelloReply,
            3 => MessageType::Connect,
            4 => MessageType::AckConnect,
            11 => MessageType::SyncStart,
            12 => MessageType::DelayRequest,
            13 => MessageType::DelayResponse,
            21 => MessageType::Leader,
            31 => MessageType::GetTime,
            32 => MessageType::Time,
            _ => return None,
        };
        Some(kind)
    }

    /// Exact payload size following the tag byte
    pub fn payload_len(&self) -> usize {
        match self {
            MessageType::Hello
            | MessageType::Connect
            | MessageType::AckConnect
            | MessageType::DelayRequest
            | MessageType::GetTime => 0,
            MessageType::HelloReply => 2,
            MessageType::Leader => 1,
            MessageType::SyncStart | MessageType::DelayResponse | MessageType::Time => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::HelloReply => "HELLO_REPLY",
            MessageType::Connect => "CONNECT",
            MessageType::AckConnect => "ACK_CONNECT",
            MessageType::SyncStart => "SYNC_START",
            MessageType::DelayRequest => "DELAY_REQUEST",
            MessageType::DelayResponse => "DELAY_RESPONSE",
            MessageType::Leader => "LEADER",
            MessageType::GetTime => "GET_TIME",
            MessageType::Time => "TIME",
        }
    }
}

/// Administrative leadership command carried by LEADER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    Begin,
    Stop,
}

impl LeaderState {
    pub const BEGIN: u8 = 0;
    pub const STOP: u8 = 255;

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::BEGIN => Some(LeaderState::Begin),
            Self::STOP => Some(LeaderState::Stop),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            LeaderState::Begin => Self::BEGIN,
            LeaderState::Stop => Self::STOP,
        }
    }
}

/// Protocol messages exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Discovery ping
    Hello,

    /// Reply to Hello with the number of registered peers
    HelloReply {
        peer_count: u16,
    },

    /// Registers the sender as a peer
    Connect,

    /// Reply to Connect
    AckConnect,

    /// A time source announcing its level and clock
    SyncStart {
        level: SyncLevel,
        timestamp: u64,
    },

    /// "What time is it now" probe sent back to a source
    DelayRequest,

    /// Reply to DelayRequest
    DelayResponse {
        level: SyncLevel,
        timestamp: u64,
    },

    /// Leadership toggle
    Leader {
        state: LeaderState,
    },

    /// Query for the current estimate
    GetTime,

    /// Reply to GetTime
    Time {
        level: SyncLevel,
        timestamp: u64,
    },
}

impl Message {
    /// Returns the type tag of this message
    pub fn kind(&self) -> MessageType {
        match self {
            Message::Hello => MessageType::Hello,
            Message::HelloReply { .. } => MessageType::HelloReply,
            Message::Connect => MessageType::Connect,
            Message::AckConnect => MessageType::AckConnect,
            Message::SyncStart { .. } => MessageType::SyncStart,
            Message::DelayRequest => MessageType::DelayRequest,
            Message::DelayResponse { .. } => MessageType::DelayResponse,
            Message::Leader { .. } => MessageType::Leader,
            Message::GetTime => MessageType::GetTime,
            Message::Time { .. } => MessageType::Time,
        }
    }

    /// Encoded size including the tag byte
    pub fn encoded_len(&self) -> usize {
        1 + self.kind().payload_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_bytes() {
        for byte in 0..=u8::MAX {
            if let Some(kind) = MessageType::from_byte(byte) {
                assert_eq!(kind as u8, byte);
            }
        }
        assert_eq!(MessageType::from_byte(100), None);
        assert_eq!(MessageType::from_byte(0), None);
    }

    #[test]
    fn test_leader_state_bytes() {
        assert_eq!(LeaderState::from_byte(0), Some(LeaderState::Begin));
        assert_eq!(LeaderState::from_byte(255), Some(LeaderState::Stop));
        assert_eq!(LeaderState::from_byte(1), None);
        assert_eq!(LeaderState::Stop.as_byte(), 255);
    }

    #[test]
    fn test_encoded_len() {
        let sync = Message::SyncStart {
            level: SyncLevel(0),
            timestamp: 0,
        };
        assert_eq!(sync.encoded_len(), 10);
        assert_eq!(Message::HelloReply { peer_count: 0 }.encoded_len(), 3);
        assert_eq!(Message::GetTime.encoded_len(), 1);
        assert_eq!(sync.kind().name(), "SYNC_START");
    }
}
