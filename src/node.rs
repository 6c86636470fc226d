//! The synchronization node
//!
//! A [`Node`] is a single actor: one event loop owns the socket, the peer
//! registry, the sync state and every timer, so each read-modify-write of
//! the sync state is applied without interleaving. Outside code talks to a
//! running node through a [`NodeHandle`].

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::{Error, NodeConfig, Result, SyncLevel};
use crate::network::{is_transient_udp_error, report, PeerRegistry, Transport};
use crate::protocol::{encode, LeaderState, Message};
use crate::sync::{
    Acceptance, Adoption, BroadcastScheduler, DelayMeasurement, LeaderTransition,
    PendingSyncAttempt, StalenessMonitor, SyncState, TimeReading,
};
use crate::time::NaturalClock;

/// Snapshot of a node's synchronization status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub level: SyncLevel,
    pub is_leader: bool,
    pub source: Option<SocketAddr>,
    pub peer_count: usize,
    pub pending_attempts: usize,
}

enum Command {
    Time(oneshot::Sender<TimeReading>),
    Status(oneshot::Sender<NodeStatus>),
    Shutdown,
}

/// Handle for querying and stopping a running node
#[derive(Clone)]
pub struct NodeHandle {
    command_tx: mpsc::Sender<Command>,
}

impl NodeHandle {
    /// Current level and time estimate, as a GET_TIME would report
    pub async fn time(&self) -> Result<TimeReading> {
        let (tx, rx) = oneshot::channel();
        self.request(Command::Time(tx), rx).await
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        let (tx, rx) = oneshot::channel();
        self.request(Command::Status(tx), rx).await
    }

    /// Asks the event loop to exit
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::invalid_state("node is not running"))
    }

    async fn request<T>(&self, command: Command, rx: oneshot::Receiver<T>) -> Result<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::invalid_state("node is not running"))?;
        rx.await
            .map_err(|_| Error::invalid_state("node stopped before replying"))
    }
}

/// A peer clock-synchronization node
pub struct Node {
    pub(crate) config: NodeConfig,
    pub(crate) transport: Transport,
    pub(crate) clock: NaturalClock,
    pub(crate) peers: PeerRegistry,
    pub(crate) state: SyncState,
    pub(crate) attempts: DelayMeasurement,
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
}

impl Node {
    /// Validates the configuration and binds the node's socket
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::bind(config.bind_addr)?;
        let (command_tx, command_rx) = mpsc::channel(32);

        Ok(Node {
            clock: NaturalClock::new(config.clock_epoch),
            attempts: DelayMeasurement::new(config.sync_timeout),
            peers: PeerRegistry::new(),
            state: SyncState::new(),
            transport,
            config,
            command_tx,
            command_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Runs the event loop until shut down through a [`NodeHandle`]
    ///
    /// Sends CONNECT to the bootstrap peer first, if one is configured.
    pub async fn run(mut self) -> Result<()> {
        let mut recv_buf = vec![0u8; self.config.recv_buf_size];
        let mut broadcaster = BroadcastScheduler::new(self.config.broadcast_interval);
        let mut monitor = StalenessMonitor::new(
            self.config.staleness_check_interval,
            self.config.staleness_threshold,
        );

        info!(addr = %self.local_addr()?, "node listening");
        if let Some(peer) = self.config.bootstrap_peer {
            self.connect(peer).await;
        }

        loop {
            tokio::select! {
                result = self.transport.recv_from(&mut recv_buf) => {
                    match result {
                        Ok((len, from)) => self.dispatch(&recv_buf[..len], from).await,
                        Err(e) if is_transient_udp_error(&e) => {
                            warn!("transient socket error: {}", e);
                        }
                        Err(e) => error!("receive failed: {}", e),
                    }
                }

                Some(attempt) = self.attempts.next_expired() => {
                    self.on_attempt_timeout(attempt);
                }

                _ = broadcaster.tick() => {
                    self.broadcast().await;
                }

                now = monitor.tick() => {
                    self.check_staleness(now, &monitor);
                }

                Some(command) = self.command_rx.recv() => {
                    match command {
                        Command::Time(reply) => {
                            let _ = reply.send(self.current_reading());
                        }
                        Command::Status(reply) => {
                            let _ = reply.send(self.status());
                        }
                        Command::Shutdown => {
                            info!(level = %self.state.level(), "node shutting down");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub(crate) fn current_reading(&self) -> TimeReading {
        self.state.reading(self.clock.now_ms())
    }

    fn status(&self) -> NodeStatus {
        NodeStatus {
            level: self.state.level(),
            is_leader: self.state.is_leader(),
            source: self.state.source().map(|s| s.addr),
            peer_count: self.peers.len(),
            pending_attempts: self.attempts.len(),
        }
    }

    async fn connect(&mut self, peer: SocketAddr) {
        self.peers.expect_ack(peer);
        match self.transport.send(Message::Connect, peer).await {
            Ok(()) => info!(peer = %peer, "sent CONNECT to bootstrap peer"),
            Err(e) => error!(peer = %peer, "failed to send CONNECT: {}", e),
        }
    }

    /// Idle -> AwaitingDelayResponse for an accepted SYNC_START
    pub(crate) async fn on_sync_start(
        &mut self,
        from: SocketAddr,
        level: SyncLevel,
        timestamp: u64,
    ) -> Result<()> {
        let received_at = self.clock.now_ms();
        if !self.peers.is_known(&from) {
            return Err(Error::peer("SYNC_START from an unregistered sender"));
        }

        match self.state.evaluate_announcement(from, level) {
            Acceptance::Accept => {}
            ignored => {
                debug!(peer = %from, level = level.0, ?ignored, "ignoring SYNC_START");
                return Ok(());
            }
        }

        let sent_at = self.clock.now_ms();
        if self.attempts.begin(from, level, timestamp, received_at, sent_at) {
            debug!(peer = %from, "superseded pending sync attempt");
        }
        self.transport.send(Message::DelayRequest, from).await
    }

    /// AwaitingDelayResponse -> Idle on a DELAY_RESPONSE
    pub(crate) async fn on_delay_response(
        &mut self,
        from: SocketAddr,
        level: SyncLevel,
        timestamp: u64,
    ) -> Result<()> {
        if !self.peers.is_known(&from) {
            return Err(Error::peer("DELAY_RESPONSE from an unregistered sender"));
        }

        let measurement = self.attempts.complete(from, level, timestamp)?;
        match self.state.adopt(&measurement, Instant::now()) {
            Adoption::Changed => self.broadcast().await,
            Adoption::Refreshed => {}
            Adoption::Rejected => {
                debug!(peer = %from, "measurement superseded by newer state");
            }
        }
        Ok(())
    }

    /// AwaitingDelayResponse -> Idle on deadline expiry
    ///
    /// Reported against the SYNC_START that opened the attempt.
    fn on_attempt_timeout(&mut self, attempt: PendingSyncAttempt) {
        let mut datagram = BytesMut::new();
        encode(&attempt.announcement(), &mut datagram);
        let err = Error::timing(format!(
            "no DELAY_RESPONSE within {:?}",
            self.config.sync_timeout
        ));
        report(&datagram, attempt.source, &err);
    }

    pub(crate) async fn on_leader(&mut self, command: LeaderState) -> Result<()> {
        let transition =
            self.state
                .apply_leader(command, Instant::now(), self.config.staleness_threshold);
        if transition == LeaderTransition::Began {
            self.broadcast().await;
        }
        Ok(())
    }

    /// Announces (level, time) to every registered peer
    async fn broadcast(&mut self) {
        let Some(message) = BroadcastScheduler::announcement(&self.state, self.clock.now_ms())
        else {
            return;
        };
        let peers: Vec<SocketAddr> = self.peers.all().map(|peer| peer.addr).collect();
        if peers.is_empty() {
            return;
        }

        let mut datagram = BytesMut::new();
        encode(&message, &mut datagram);
        match self.transport.broadcast(message, &peers).await {
            Ok(failures) => {
                for (peer, e) in failures {
                    report(&datagram, peer, &e);
                }
            }
            Err(e) => error!("failed to encode SYNC_START: {}", e),
        }
    }

    fn check_staleness(&mut self, now: Instant, monitor: &StalenessMonitor) {
        if let Some(dropped) = self.state.expire_stale(now, monitor.threshold()) {
            warn!(
                source = %dropped.addr,
                "time source silent for over {:?}, now {}",
                monitor.threshold(),
                self.state.level()
            );
        }
    }
}
