//! Integration tests for the connection manager over real loopback TCP.
//!
//! # Purpose
//!
//! These tests run hosts and clients in one process, each with its own
//! [`MessageRelay`] as event sink, and observe what arrives where.  They
//! verify:
//!
//! - Host relay: a message from one client reaches every other client and the
//!   host, but never comes back to its sender.
//! - Disconnects: a client that goes away is removed from the host's peer set,
//!   and broadcasting keeps working for the rest.
//! - Setup errors: bad addresses, occupied ports, unstarted managers.
//!
//! Every host binds port 0 on 127.0.0.1 so tests can run in parallel.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use linkvue_peer::application::relay::MessageRelay;
use linkvue_peer::infrastructure::network::connection_manager::{
    ConnectionManager, NetworkConfig, NetworkError, PeerRole, Role, SessionState,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

fn loopback_config() -> NetworkConfig {
    NetworkConfig {
        bind_address: Ipv4Addr::LOCALHOST,
        connect_timeout: Duration::from_secs(2),
        accept_poll_interval: Duration::from_millis(5),
        accept_error_backoff: Duration::from_millis(20),
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Starts a host on an OS-assigned port.
fn start_host() -> (ConnectionManager, Arc<MessageRelay>, u16) {
    let relay = Arc::new(MessageRelay::new());
    let mut host = ConnectionManager::new(loopback_config(), relay.clone());
    host.initialize_host(0).expect("host bind");
    host.start().expect("host start");
    let port = host.local_addr().expect("bound address").port();
    (host, relay, port)
}

/// Starts a client connected to `127.0.0.1:port`.
fn start_client(port: u16) -> (ConnectionManager, Arc<MessageRelay>) {
    let relay = Arc::new(MessageRelay::new());
    let mut client = ConnectionManager::new(loopback_config(), relay.clone());
    client
        .initialize_client("127.0.0.1", port)
        .expect("client connect");
    client.start().expect("client start");
    (client, relay)
}

// ── Relay ─────────────────────────────────────────────────────────────────────

#[test]
fn test_host_relays_between_clients_without_echo() {
    // Arrange
    let (host, host_relay, port) = start_host();
    let (a, a_relay) = start_client(port);
    let (b, b_relay) = start_client(port);
    assert!(wait_until(|| host.peer_count() == 2), "both clients admitted");

    // Act – A speaks
    a.send_message(b"from-a").expect("a sends");

    // Assert – B and the host hear it, A does not
    assert!(wait_until(|| b_relay.pending() == 1));
    assert!(wait_until(|| host_relay.pending() == 1));
    assert_eq!(b_relay.drain(), vec![b"from-a".to_vec()]);
    assert_eq!(host_relay.drain(), vec![b"from-a".to_vec()]);

    // Act – B answers
    b.send_message(b"from-b").expect("b sends");

    // Assert
    assert!(wait_until(|| a_relay.pending() == 1));
    assert_eq!(a_relay.drain(), vec![b"from-b".to_vec()]);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(b_relay.pending(), 0, "sender must not receive its own message");
}

#[test]
fn test_host_broadcast_reaches_every_client() {
    // Arrange
    let (host, _host_relay, port) = start_host();
    let (_a, a_relay) = start_client(port);
    let (_b, b_relay) = start_client(port);
    assert!(wait_until(|| host.peer_count() == 2));

    // Act
    let delivered = host.broadcast_message(b"snapshot").expect("broadcast");

    // Assert
    assert_eq!(delivered, 2);
    assert!(wait_until(|| a_relay.pending() == 1 && b_relay.pending() == 1));
}

#[test]
fn test_messages_from_one_client_arrive_in_order() {
    let (host, host_relay, port) = start_host();
    let (client, _client_relay) = start_client(port);
    assert!(wait_until(|| host.peer_count() == 1));

    for i in 0..20 {
        client
            .send_message(format!("msg-{i}").as_bytes())
            .expect("send");
    }

    assert!(wait_until(|| host_relay.pending() == 20));
    let expected: Vec<Vec<u8>> = (0..20).map(|i| format!("msg-{i}").into_bytes()).collect();
    assert_eq!(host_relay.drain(), expected);
}

// ── Disconnects ───────────────────────────────────────────────────────────────

#[test]
fn test_broadcast_after_client_leaves_still_reaches_the_rest() {
    // Arrange
    let (host, host_relay, port) = start_host();
    let (_a, a_relay) = start_client(port);
    let (mut b, _b_relay) = start_client(port);
    assert!(wait_until(|| host.peer_count() == 2));
    assert!(wait_until(|| host_relay.connected_peers() == 2));

    // Act – B leaves, then the host broadcasts
    b.stop();
    assert!(wait_until(|| host.peer_count() == 1), "host drops the closed peer");
    let delivered = match host.broadcast_message(b"after-b") {
        Ok(n) => n,
        Err(NetworkError::PartialBroadcast { delivered, .. }) => delivered,
        Err(e) => panic!("unexpected broadcast error: {e}"),
    };

    // Assert
    assert_eq!(delivered, 1);
    assert!(wait_until(|| a_relay.pending() == 1));
    assert_eq!(host.peers().len(), 1);
    assert!(host
        .peers()
        .iter()
        .all(|peer| peer.role == PeerRole::HostAccepted));
    assert!(wait_until(|| host_relay.connected_peers() == 1));
}

#[test]
fn test_client_reports_stopped_after_host_goes_away() {
    // Arrange
    let (mut host, _host_relay, port) = start_host();
    let (client, client_relay) = start_client(port);
    assert!(wait_until(|| client_relay.connected_peers() == 1));

    // Act
    host.stop();

    // Assert
    assert!(wait_until(|| client.state() == SessionState::Stopped));
    assert!(wait_until(|| client_relay.connected_peers() == 0));
    assert!(client.send_message(b"anyone?").is_err());
}

#[test]
fn test_stop_with_live_peers_returns_promptly() {
    // Arrange
    let (mut host, _host_relay, port) = start_host();
    let (_a, _) = start_client(port);
    let (_b, _) = start_client(port);
    assert!(wait_until(|| host.peer_count() == 2));

    // Act
    let started = Instant::now();
    host.stop();

    // Assert
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(host.peer_count(), 0);
    assert_eq!(host.state(), SessionState::Stopped);
    assert!(!host.is_running());
}

// ── Setup errors ──────────────────────────────────────────────────────────────

#[test]
fn test_client_role_reports_its_upstream() {
    let (_host, _host_relay, port) = start_host();
    let (client, _) = start_client(port);

    let peers = client.peers();

    assert_eq!(client.role(), Some(Role::Client));
    assert_eq!(client.state(), SessionState::ClientConnected);
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].role, PeerRole::ClientOutbound);
    assert_eq!(peers[0].addr.port(), port);
}

#[test]
fn test_client_cannot_broadcast() {
    let (_host, _host_relay, port) = start_host();
    let (client, _) = start_client(port);

    let result = client.broadcast_message(b"x");

    assert!(matches!(
        result,
        Err(NetworkError::WrongRole {
            role: Role::Client,
            ..
        })
    ));
}

#[test]
fn test_invalid_address_is_rejected_without_connecting() {
    let mut client = ConnectionManager::new(loopback_config(), Arc::new(MessageRelay::new()));

    let result = client.initialize_client("not-an-ip", 5000);

    assert!(matches!(result, Err(NetworkError::InvalidAddress(_))));
    assert!(matches!(client.start(), Err(NetworkError::NotInitialized)));
}

#[test]
fn test_second_host_on_same_port_fails_to_bind() {
    let (_host, _relay, port) = start_host();
    let mut second = ConnectionManager::new(loopback_config(), Arc::new(MessageRelay::new()));

    let result = second.initialize_host(port);

    assert!(matches!(result, Err(NetworkError::BindFailed { .. })));
    assert_eq!(second.state(), SessionState::Stopped);
}
