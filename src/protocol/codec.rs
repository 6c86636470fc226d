use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::core::{DecodeError, Error, SyncLevel};
use super::message::{LeaderState, Message, MessageType};

/// Decodes a single datagram
///
/// The payload length is implied by the tag and must match exactly.
pub fn decode(datagram: &[u8]) -> Result<Message, DecodeError> {
    let (&tag, mut payload) = datagram.split_first().ok_or(DecodeError::Empty)?;
    let kind = MessageType::from_byte(tag).ok_or(DecodeError::UnknownType(tag))?;

    if payload.len() != kind.payload_len() {
        return Err(DecodeError::BadPayloadLength {
            kind: kind.name(),
            expected: kind.payload_len(),
            actual: payload.len(),
        });
    }

    let message = match kind {
        MessageType::Hello => Message::Hello,
        MessageType::HelloReply => Message::HelloReply {
            peer_count: payload.get_u16(),
        },
        MessageType::Connect => Message::Connect,
        MessageType::AckConnect => Message::AckConnect,
        MessageType::SyncStart => Message::SyncStart {
            level: SyncLevel(payload.get_u8()),
            timestamp: payload.get_u64(),
        },
        MessageType::DelayRequest => Message::DelayRequest,
        MessageType::DelayResponse => Message::DelayResponse {
            level: SyncLevel(payload.get_u8()),
            timestamp: payload.get_u64(),
        },
        MessageType::Leader => {
            let raw = payload.get_u8();
            let state = LeaderState::from_byte(raw).ok_or(DecodeError::InvalidLeaderState(raw))?;
            Message::Leader { state }
        }
        MessageType::GetTime => Message::GetTime,
        MessageType::Time => Message::Time {
            level: SyncLevel(payload.get_u8()),
            timestamp: payload.get_u64(),
        },
    };

    Ok(message)
}

/// Appends the wire form of `message` to `dst`
pub fn encode(message: &Message, dst: &mut BytesMut) {
    dst.reserve(message.encoded_len());
    dst.put_u8(message.kind() as u8);

    match message {
        Message::HelloReply { peer_count } => dst.put_u16(*peer_count),
        Message::SyncStart { level, timestamp }
        | Message::DelayResponse { level, timestamp }
        | Message::Time { level, timestamp } => {
            dst.put_u8(level.0);
            dst.put_u64(*timestamp);
        }
        Message::Leader { state } => dst.put_u8(state.as_byte()),
        Message::Hello
        | Message::Connect
        | Message::AckConnect
        | Message::DelayRequest
        | Message::GetTime => {}
    }
}

/// Outbound datagram codec used by the transport
#[derive(Clone, Debug, Default)]
pub struct WireCodec;

impl WireCodec {
    /// Creates a new wire codec
    pub fn new() -> Self {
        WireCodec
    }
}

impl Encoder<Message> for WireCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode(&item, dst);
        Ok(())
    }
}
