//! Inbound datagram demultiplexing
//!
//! This is the one place where malformed or unexpected input turns into an
//! error report. Nothing reaching the dispatcher can stop the node, and no
//! error is ever answered on the wire.

use std::net::SocketAddr;

use tokio::time::Instant;
use tracing::{debug, error};

use crate::core::{Error, Result, REPORT_PREFIX_LEN};
use crate::node::Node;
use crate::protocol::{decode, Message};

/// Emits the diagnostic line for a rejected datagram
///
/// Rendered as `ERROR MSG <hex prefix> peer=.. reason=..`.
pub fn report(datagram: &[u8], from: SocketAddr, err: &Error) {
    let prefix = &datagram[..datagram.len().min(REPORT_PREFIX_LEN)];
    error!(peer = %from, reason = %err, "MSG {}", hex::encode(prefix));
}

impl Node {
    /// Decodes and routes one datagram
    pub(crate) async fn dispatch(&mut self, datagram: &[u8], from: SocketAddr) {
        let message = match decode(datagram) {
            Ok(message) => message,
            Err(e) => {
                report(datagram, from, &e.into());
                return;
            }
        };

        debug!(peer = %from, kind = message.kind().name(), "received");
        if let Err(e) = self.route(message, from).await {
            report(datagram, from, &e);
        }
    }

    async fn route(&mut self, message: Message, from: SocketAddr) -> Result<()> {
        match message {
            Message::Hello => {
                let reply = Message::HelloReply {
                    peer_count: self.peers.reply_count(),
                };
                self.transport.send(reply, from).await
            }

            Message::Connect => {
                if self.peers.register(from, Instant::now()) {
                    debug!(peer = %from, peers = self.peers.len(), "peer registered");
                }
                self.transport.send(Message::AckConnect, from).await
            }

            Message::AckConnect => {
                if self.peers.acknowledge(from, Instant::now()) {
                    debug!(peer = %from, "connection acknowledged");
                    Ok(())
                } else {
                    Err(Error::peer("unsolicited ACK_CONNECT"))
                }
            }

            Message::SyncStart { level, timestamp } => {
                self.on_sync_start(from, level, timestamp).await
            }

            // Acting as a time source for the sender: stateless reply
            Message::DelayRequest => {
                let reading = self.current_reading();
                let reply = Message::DelayResponse {
                    level: reading.level,
                    timestamp: reading.timestamp,
                };
                self.transport.send(reply, from).await
            }

            Message::DelayResponse { level, timestamp } => {
                self.on_delay_response(from, level, timestamp).await
            }

            Message::Leader { state } => self.on_leader(state).await,

            Message::GetTime => {
                let reading = self.current_reading();
                let reply = Message::Time {
                    level: reading.level,
                    timestamp: reading.timestamp,
                };
                self.transport.send(reply, from).await
            }

            Message::HelloReply { .. } | Message::Time { .. } => Err(Error::protocol(format!(
                "unsolicited {}",
                message.kind().name()
            ))),
        }
    }
}
