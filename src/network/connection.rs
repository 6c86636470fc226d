use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use futures::future::join_all;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::codec::Encoder;

use crate::core::{Error, Result};
use crate::protocol::{Message, WireCodec, MAX_MESSAGE_SIZE};

/// The node's single UDP endpoint
pub struct Transport {
    /// UDP socket for communication
    socket: UdpSocket,
    /// Message codec
    codec: WireCodec,
    /// Buffer for outgoing datagrams
    send_buf: BytesMut,
}

impl Transport {
    /// Binds the endpoint
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(bind_addr: SocketAddr) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::network(format!("Failed to create socket: {}", e)))?;
        if bind_addr.is_ipv6() {
            // Accept IPv4-mapped peers on a wildcard IPv6 bind
            socket.set_only_v6(false)?;
        }
        socket.set_nonblocking(true)?;
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Error::network(format!("Failed to bind socket to {}: {}", bind_addr, e)))?;

        let socket = UdpSocket::from_std(socket.into())?;

        Ok(Transport {
            socket,
            codec: WireCodec::new(),
            send_buf: BytesMut::with_capacity(MAX_MESSAGE_SIZE),
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::network(format!("Failed to get local address: {}", e)))
    }

    /// Receives one datagram. Cancel safe.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Sends a message to a single address
    pub async fn send(&mut self, message: Message, addr: SocketAddr) -> Result<()> {
        self.send_buf.clear();
        self.codec.encode(message, &mut self.send_buf)?;
        self.socket
            .send_to(&self.send_buf, addr)
            .await
            .map_err(|e| Error::network(format!("Failed to send to {}: {}", addr, e)))?;
        Ok(())
    }

    /// Sends the same message to every address concurrently
    ///
    /// Returns the addresses that could not be reached.
    pub async fn broadcast(
        &mut self,
        message: Message,
        peers: &[SocketAddr],
    ) -> Result<Vec<(SocketAddr, Error)>> {
        self.send_buf.clear();
        self.codec.encode(message, &mut self.send_buf)?;
        let datagram = self.send_buf.split().freeze();

        let socket = &self.socket;
        let sends = peers.iter().map(|&addr| {
            let datagram = datagram.clone();
            async move { (addr, socket.send_to(&datagram, addr).await) }
        });

        let failures = join_all(sends)
            .await
            .into_iter()
            .filter_map(|(addr, result)| result.err().map(|e| (addr, Error::from(e))))
            .collect();
        Ok(failures)
    }
}

/// Errors a UDP socket may report after an ICMP unreachable from a past send
pub fn is_transient_udp_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
