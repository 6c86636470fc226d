//! Multi-node synchronization over loopback

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use peer_time_sync::protocol::{encode, LeaderState, Message};
use peer_time_sync::{Node, NodeConfig, NodeHandle, Result, SyncLevel};

struct TestNode {
    addr: SocketAddr,
    handle: NodeHandle,
    task: JoinHandle<Result<()>>,
}

impl TestNode {
    async fn start(bootstrap_peer: Option<SocketAddr>) -> Self {
        let config = NodeConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            bootstrap_peer,
            broadcast_interval: Duration::from_millis(300),
            staleness_check_interval: Duration::from_millis(50),
            staleness_threshold: Duration::from_millis(900),
            sync_timeout: Duration::from_millis(400),
            ..Default::default()
        };
        let node = Node::bind(config).await.unwrap();
        let addr = node.local_addr().unwrap();
        let handle = node.handle();
        TestNode {
            addr,
            handle,
            task: tokio::spawn(node.run()),
        }
    }

    async fn level(&self) -> SyncLevel {
        self.handle.time().await.unwrap().level
    }

    /// Polls until the node reports `level` or `within` elapses
    async fn wait_for_level(&self, level: SyncLevel, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.level().await == level {
                return true;
            }
            sleep(Duration::from_millis(25)).await;
        }
        false
    }

    async fn stop(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap().unwrap();
    }
}

async fn send_leader(to: SocketAddr, state: LeaderState) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut buf = BytesMut::new();
    encode(&Message::Leader { state }, &mut buf);
    socket.send_to(&buf, to).await.unwrap();
}

#[tokio::test]
async fn test_levels_cascade_from_leader() {
    let a = TestNode::start(None).await;
    let b = TestNode::start(Some(a.addr)).await;
    let c = TestNode::start(Some(b.addr)).await;

    // Let the CONNECT handshakes settle
    sleep(Duration::from_millis(200)).await;
    assert_eq!(a.handle.status().await.unwrap().peer_count, 1);
    assert_eq!(b.handle.status().await.unwrap().peer_count, 2);
    assert_eq!(c.level().await, SyncLevel::UNSYNCHRONIZED);

    send_leader(a.addr, LeaderState::Begin).await;

    assert!(a.wait_for_level(SyncLevel::LEADER, Duration::from_secs(1)).await);
    assert!(b.wait_for_level(SyncLevel(1), Duration::from_secs(2)).await);
    assert!(c.wait_for_level(SyncLevel(2), Duration::from_secs(2)).await);

    let status = c.handle.status().await.unwrap();
    assert_eq!(status.source, Some(b.addr));
    assert!(!status.is_leader);

    // Synchronized clocks agree with the leader within loopback jitter
    let leader_time = a.handle.time().await.unwrap().timestamp;
    let follower_time = c.handle.time().await.unwrap().timestamp;
    assert!(
        leader_time.abs_diff(follower_time) < 50,
        "leader {} follower {}",
        leader_time,
        follower_time
    );

    // Parents never follow their descendants
    sleep(Duration::from_millis(700)).await;
    assert_eq!(a.level().await, SyncLevel::LEADER);
    assert_eq!(b.level().await, SyncLevel(1));

    a.stop().await;
    b.stop().await;
    c.stop().await;
}

#[tokio::test]
async fn test_leader_stop_gives_up_level_zero() {
    let a = TestNode::start(None).await;
    let b = TestNode::start(Some(a.addr)).await;
    sleep(Duration::from_millis(200)).await;

    send_leader(a.addr, LeaderState::Begin).await;
    assert!(b.wait_for_level(SyncLevel(1), Duration::from_secs(2)).await);

    send_leader(a.addr, LeaderState::Stop).await;
    sleep(Duration::from_millis(100)).await;

    // With no stashed source the former leader may go on to follow its
    // former child, but never at level 0
    let status = a.handle.status().await.unwrap();
    assert!(!status.is_leader);
    assert!(status.level > SyncLevel::LEADER);

    a.stop().await;
    b.stop().await;
}

#[tokio::test]
async fn test_follower_reverts_when_source_disappears() {
    let a = TestNode::start(None).await;
    let b = TestNode::start(Some(a.addr)).await;
    sleep(Duration::from_millis(200)).await;

    send_leader(a.addr, LeaderState::Begin).await;
    assert!(b.wait_for_level(SyncLevel(1), Duration::from_secs(2)).await);
    assert_eq!(b.handle.status().await.unwrap().source, Some(a.addr));

    a.stop().await;

    assert!(b.wait_for_level(SyncLevel::UNSYNCHRONIZED, Duration::from_secs(3)).await);
    assert_eq!(b.handle.status().await.unwrap().source, None);

    b.stop().await;
}

#[tokio::test]
async fn test_unconnected_node_ignores_leader() {
    let a = TestNode::start(None).await;
    let loner = TestNode::start(None).await;

    send_leader(a.addr, LeaderState::Begin).await;
    assert!(a.wait_for_level(SyncLevel::LEADER, Duration::from_secs(1)).await);

    sleep(Duration::from_millis(700)).await;
    assert_eq!(loner.level().await, SyncLevel::UNSYNCHRONIZED);
    assert_eq!(a.handle.status().await.unwrap().peer_count, 0);

    a.stop().await;
    loner.stop().await;
}
