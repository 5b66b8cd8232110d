//! ConnectionManager: host/client role, accept loop, per-connection receive
//! threads, relay between peers, and broadcast fan-out.
//!
//! # Roles (for beginners)
//!
//! A manager is configured exactly once per session, as either:
//!
//! - a **host**: [`ConnectionManager::initialize_host`] binds a listening
//!   socket.  After [`ConnectionManager::start`], an accept thread admits any
//!   number of peers.  Whatever one peer sends is handed to the event sink
//!   *and* forwarded to every other peer, never back to the sender.
//! - a **client**: [`ConnectionManager::initialize_client`] connects to one
//!   host.  After `start`, a receive thread reads the host's messages.
//!
//! ```text
//!   Idle ──initialize──► Initializing ──ok──► HostAccepting | ClientConnected
//!                              │                          │
//!                              └──error──► Stopped ◄──────┘ stop() / upstream lost
//! ```
//!
//! # Threads
//!
//! - one accept thread (host only), polling a non-blocking listener so it can
//!   observe the `running` flag between polls;
//! - one receive thread per live connection.
//!
//! [`ConnectionManager::stop`] clears the running flag, shuts every socket down
//! (which unblocks the receive threads) and joins every thread before it
//! returns.  Dropping the manager runs `stop`.
//!
//! # Callbacks
//!
//! [`PeerEventSink`] methods run on the background threads.  They must return
//! quickly and must never call back into `stop` (the thread would wait on
//! itself).

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use linkvue_core::protocol::framing::FrameError;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::transport::{LinkReader, Listener, PeerLink};

/// Identifier assigned to every connection when it is opened.
pub type PeerId = Uuid;

/// Error type for connection management operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("connection manager is already initialized (state {0:?})")]
    AlreadyInitialized(SessionState),
    #[error("connection manager is not initialized")]
    NotInitialized,
    #[error("{operation} is not available in {role:?} role")]
    WrongRole { operation: &'static str, role: Role },
    #[error("not connected to a host")]
    NotConnected,
    #[error("refusing to send an empty payload")]
    EmptyPayload,
    #[error("send to peer {peer} failed: {source}")]
    SendFailed {
        peer: PeerId,
        #[source]
        source: FrameError,
    },
    #[error("broadcast reached {delivered} peer(s), {} failed", .failed.len())]
    PartialBroadcast { delivered: usize, failed: Vec<PeerId> },
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which side of the session this manager plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

/// Lifecycle of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    HostAccepting,
    ClientConnected,
    Stopped,
}

/// How a connection came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Admitted by a host's accept loop.
    HostAccepted,
    /// Opened by a client towards its host.
    ClientOutbound,
}

/// Public view of one open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: PeerId,
    pub role: PeerRole,
    pub addr: SocketAddr,
}

/// Receives network activity from the manager's background threads.
///
/// Implementations must be cheap and non-blocking; the relay just queues.
#[cfg_attr(test, mockall::automock)]
pub trait PeerEventSink: Send + Sync {
    /// A non-empty payload arrived from `from`.
    fn on_message_received(&self, from: PeerId, payload: Vec<u8>);
    /// A connection was opened (accepted by a host, or a client's upstream
    /// after `start`).
    fn on_peer_connected(&self, peer: PeerId, addr: SocketAddr);
    /// A connection was closed.  Fires exactly once per connected peer.
    fn on_peer_disconnected(&self, peer: PeerId);
}

/// Tunables for the manager.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface the host listens on.
    pub bind_address: Ipv4Addr,
    /// Upper bound on a client's connect attempt.
    pub connect_timeout: Duration,
    /// Sleep between non-blocking accept polls.
    pub accept_poll_interval: Duration,
    /// Pause after an accept error before polling again.
    pub accept_error_backoff: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            connect_timeout: Duration::from_secs(5),
            accept_poll_interval: Duration::from_millis(50),
            accept_error_backoff: Duration::from_millis(250),
        }
    }
}

struct Connection {
    info: PeerInfo,
    link: Arc<PeerLink>,
}

/// State shared between the manager and its background threads.
struct Shared {
    sink: Arc<dyn PeerEventSink>,
    running: AtomicBool,
    state: Mutex<SessionState>,
    peers: Mutex<HashMap<PeerId, Connection>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!("session state {:?} -> {next:?}", *state);
            *state = next;
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, Connection>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clones the links of every peer except `skip`, so sends happen outside
    /// the peer-set lock.
    fn links_except(&self, skip: Option<PeerId>) -> Vec<(PeerId, Arc<PeerLink>)> {
        self.peers()
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .map(|(id, conn)| (*id, Arc::clone(&conn.link)))
            .collect()
    }

    /// Removes `peer`, closes its socket and fires `on_peer_disconnected`.
    ///
    /// Only the caller that actually removes the entry fires the callback, so
    /// a peer dropped by a failed broadcast and by its own receive thread is
    /// still reported once.
    fn drop_peer(&self, peer: PeerId) -> bool {
        let removed = self.peers().remove(&peer);
        match removed {
            Some(conn) => {
                conn.link.close();
                info!("peer {peer} ({}) disconnected", conn.info.addr);
                self.sink.on_peer_disconnected(peer);
                true
            }
            None => false,
        }
    }

    /// Forwards a payload received from `from` to every other peer.
    fn relay_from(&self, from: PeerId, payload: &[u8]) {
        for (id, link) in self.links_except(Some(from)) {
            if let Err(e) = link.send(payload) {
                warn!("relay from {from} to {id} failed: {e}");
                self.drop_peer(id);
            }
        }
    }
}

/// The connection manager.
///
/// Owns every socket and thread of the peer.  The application layer only talks
/// to it through `send_message` / `broadcast_message` and the sink it was
/// built with.
pub struct ConnectionManager {
    config: NetworkConfig,
    shared: Arc<Shared>,
    role: Option<Role>,
    local_addr: Option<SocketAddr>,
    /// Host: the bound listener, moved into the accept thread by `start`.
    listener: Option<Listener>,
    /// Client: the upstream read half, moved into its receive thread by `start`.
    upstream_reader: Option<(PeerId, LinkReader)>,
    accept_thread: Option<JoinHandle<()>>,
    started: bool,
}

impl ConnectionManager {
    /// Creates an idle manager reporting to `sink`.
    pub fn new(config: NetworkConfig, sink: Arc<dyn PeerEventSink>) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                sink,
                running: AtomicBool::new(false),
                state: Mutex::new(SessionState::Idle),
                peers: Mutex::new(HashMap::new()),
                workers: Mutex::new(Vec::new()),
            }),
            role: None,
            local_addr: None,
            listener: None,
            upstream_reader: None,
            accept_thread: None,
            started: false,
        }
    }

    // ── Setup ─────────────────────────────────────────────────────────────────

    /// Binds a listening socket on `bind_address:port` and enters host role.
    ///
    /// Port `0` asks the OS for a free port; see [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// [`NetworkError::AlreadyInitialized`] while a session is active, or
    /// [`NetworkError::BindFailed`] (state becomes `Stopped`).
    pub fn initialize_host(&mut self, port: u16) -> Result<(), NetworkError> {
        self.begin_initialize()?;
        let addr = SocketAddr::from((self.config.bind_address, port));

        match Listener::bind(addr) {
            Ok(listener) => {
                let bound = listener.local_addr();
                self.local_addr = Some(bound);
                self.listener = Some(listener);
                self.role = Some(Role::Host);
                self.shared.set_state(SessionState::HostAccepting);
                info!("hosting on {bound}");
                Ok(())
            }
            Err(source) => {
                error!("failed to bind {addr}: {source}");
                self.shared.set_state(SessionState::Stopped);
                Err(NetworkError::BindFailed { addr, source })
            }
        }
    }

    /// Connects to a host at `address:port` and enters client role.
    ///
    /// `address` must be a dotted-quad IPv4 literal; host names are not
    /// resolved.
    ///
    /// # Errors
    ///
    /// [`NetworkError::AlreadyInitialized`], [`NetworkError::InvalidAddress`],
    /// or [`NetworkError::ConnectFailed`].  The latter two leave the state at
    /// `Stopped`.
    pub fn initialize_client(&mut self, address: &str, port: u16) -> Result<(), NetworkError> {
        self.begin_initialize()?;

        let ip: Ipv4Addr = match address.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                error!("invalid host address {address:?}");
                self.shared.set_state(SessionState::Stopped);
                return Err(NetworkError::InvalidAddress(address.to_string()));
            }
        };
        let addr = SocketAddr::from((ip, port));

        let (link, reader) = match PeerLink::connect(addr, self.config.connect_timeout) {
            Ok(pair) => pair,
            Err(source) => {
                error!("failed to connect to {addr}: {source}");
                self.shared.set_state(SessionState::Stopped);
                return Err(NetworkError::ConnectFailed { addr, source });
            }
        };

        let id = Uuid::new_v4();
        self.local_addr = link.local_addr().ok();
        self.shared.peers().insert(
            id,
            Connection {
                info: PeerInfo {
                    id,
                    role: PeerRole::ClientOutbound,
                    addr,
                },
                link: Arc::new(link),
            },
        );
        self.upstream_reader = Some((id, reader));
        self.role = Some(Role::Client);
        self.shared.set_state(SessionState::ClientConnected);
        info!("connected to host {addr}");
        Ok(())
    }

    /// Refuses re-initialization of an active session and tears down the
    /// remains of a stopped one.
    fn begin_initialize(&mut self) -> Result<(), NetworkError> {
        match self.shared.state() {
            SessionState::Idle => {}
            SessionState::Stopped => self.stop(),
            active => return Err(NetworkError::AlreadyInitialized(active)),
        }
        self.role = None;
        self.local_addr = None;
        self.shared.set_state(SessionState::Initializing);
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Spawns the accept loop (host) or the upstream receive loop (client).
    ///
    /// Calling `start` again on a started manager does nothing.
    ///
    /// # Errors
    ///
    /// [`NetworkError::NotInitialized`] if no initialize succeeded, or the
    /// session already ended; [`NetworkError::Spawn`] if the OS refuses a thread.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.started {
            debug!("start() on a running manager ignored");
            return Ok(());
        }
        let role = match (self.role, self.shared.state()) {
            (Some(Role::Host), SessionState::HostAccepting) => Role::Host,
            (Some(Role::Client), SessionState::ClientConnected) => Role::Client,
            _ => return Err(NetworkError::NotInitialized),
        };

        self.shared.running.store(true, Ordering::SeqCst);
        let result = match role {
            Role::Host => self.start_accept_loop(),
            Role::Client => self.start_upstream_loop(),
        };
        match result {
            Ok(()) => {
                self.started = true;
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn start_accept_loop(&mut self) -> Result<(), NetworkError> {
        let listener = self.listener.take().ok_or(NetworkError::NotInitialized)?;
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let handle = std::thread::Builder::new()
            .name("linkvue-accept".to_string())
            .spawn(move || accept_loop(shared, listener, config))
            .map_err(|source| NetworkError::Spawn {
                name: "linkvue-accept".to_string(),
                source,
            })?;
        self.accept_thread = Some(handle);
        Ok(())
    }

    fn start_upstream_loop(&mut self) -> Result<(), NetworkError> {
        let (id, reader) = self
            .upstream_reader
            .take()
            .ok_or(NetworkError::NotInitialized)?;
        let addr = self
            .shared
            .peers()
            .get(&id)
            .map(|conn| conn.info.addr)
            .ok_or(NetworkError::NotConnected)?;
        self.shared.sink.on_peer_connected(id, addr);

        let shared = Arc::clone(&self.shared);
        let name = "linkvue-upstream".to_string();
        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || receive_loop(&shared, id, reader, Role::Client));
        match spawned {
            Ok(handle) => {
                self.shared.workers().push(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.drop_peer(id);
                self.shared.set_state(SessionState::Stopped);
                Err(NetworkError::Spawn { name, source })
            }
        }
    }

    /// Stops every loop, closes every connection and joins every thread.
    ///
    /// Safe to call any number of times.  Must not be called from a
    /// [`PeerEventSink`] callback.
    pub fn stop(&mut self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);

        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                error!("accept thread panicked");
            }
        }
        // Never started: drop the listener here to release the port.
        self.listener = None;

        for (_, link) in self.shared.links_except(None) {
            link.close();
        }
        let workers = std::mem::take(&mut *self.shared.workers());
        for handle in workers {
            if handle.join().is_err() {
                error!("receive thread panicked");
            }
        }

        // A client that was initialized but never started still holds its
        // upstream; no connect event fired, so none is owed on the way out.
        self.upstream_reader = None;
        let leftovers: Vec<Connection> = self.shared.peers().drain().map(|(_, c)| c).collect();
        for conn in leftovers {
            conn.link.close();
        }

        self.started = false;
        if self.role.is_some() || self.shared.state() != SessionState::Idle {
            self.shared.set_state(SessionState::Stopped);
        }
        if was_running {
            info!("connection manager stopped");
        }
    }

    // ── Messaging ─────────────────────────────────────────────────────────────

    /// Sends `payload` to the host.  Client role only.
    ///
    /// Refused with [`NetworkError::NotConnected`] until [`start`](Self::start)
    /// has run.  A failed write tears the upstream down and ends the session.
    ///
    /// # Errors
    ///
    /// [`NetworkError::WrongRole`], [`NetworkError::NotConnected`],
    /// [`NetworkError::EmptyPayload`] or [`NetworkError::SendFailed`].
    pub fn send_message(&self, payload: &[u8]) -> Result<(), NetworkError> {
        match self.role {
            None => return Err(NetworkError::NotInitialized),
            Some(Role::Host) => {
                return Err(NetworkError::WrongRole {
                    operation: "send_message",
                    role: Role::Host,
                })
            }
            Some(Role::Client) => {}
        }
        if payload.is_empty() {
            return Err(NetworkError::EmptyPayload);
        }
        if !self.started || self.shared.state() != SessionState::ClientConnected {
            return Err(NetworkError::NotConnected);
        }

        let (id, link) = self
            .shared
            .links_except(None)
            .into_iter()
            .next()
            .ok_or(NetworkError::NotConnected)?;

        link.send(payload).map_err(|source| {
            error!("send to host failed: {source}; closing session");
            self.shared.drop_peer(id);
            self.shared.set_state(SessionState::Stopped);
            NetworkError::SendFailed { peer: id, source }
        })
    }

    /// Sends `payload` to every connected peer.  Host role only.
    ///
    /// Peers whose write fails are disconnected; the rest still receive the
    /// payload.  Returns the number of peers reached.
    ///
    /// # Errors
    ///
    /// [`NetworkError::WrongRole`], [`NetworkError::EmptyPayload`], or
    /// [`NetworkError::PartialBroadcast`] naming the peers that were dropped.
    pub fn broadcast_message(&self, payload: &[u8]) -> Result<usize, NetworkError> {
        match self.role {
            None => return Err(NetworkError::NotInitialized),
            Some(Role::Client) => {
                return Err(NetworkError::WrongRole {
                    operation: "broadcast_message",
                    role: Role::Client,
                })
            }
            Some(Role::Host) => {}
        }
        if payload.is_empty() {
            return Err(NetworkError::EmptyPayload);
        }

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, link) in self.shared.links_except(None) {
            match link.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("broadcast to {id} failed: {e}");
                    self.shared.drop_peer(id);
                    failed.push(id);
                }
            }
        }

        if failed.is_empty() {
            Ok(delivered)
        } else {
            Err(NetworkError::PartialBroadcast { delivered, failed })
        }
    }

    // ── Observers ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers().len()
    }

    /// Snapshot of the open connections.
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.shared
            .peers()
            .values()
            .map(|conn| conn.info.clone())
            .collect()
    }

    /// Host: the bound listening address.  Client: the local end of the upstream.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Background loops ──────────────────────────────────────────────────────────

fn accept_loop(shared: Arc<Shared>, listener: Listener, config: NetworkConfig) {
    info!("accepting peers on {}", listener.local_addr());

    while shared.running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok(Some((link, reader))) => admit(&shared, link, reader),
            Ok(None) => std::thread::sleep(config.accept_poll_interval),
            Err(e) => {
                warn!("accept failed: {e}; retrying");
                std::thread::sleep(config.accept_error_backoff);
            }
        }
    }

    info!("accept loop stopped");
}

/// Registers an accepted connection and gives it a receive thread.
///
/// The connect event fires before the peer becomes visible to relays and
/// before its receive thread exists, so it always precedes the matching
/// disconnect.
fn admit(shared: &Arc<Shared>, link: PeerLink, reader: LinkReader) {
    let id = Uuid::new_v4();
    let addr = link.remote_addr();
    info!("peer {id} connected from {addr}");
    shared.sink.on_peer_connected(id, addr);

    let info = PeerInfo {
        id,
        role: PeerRole::HostAccepted,
        addr,
    };
    shared.peers().insert(
        id,
        Connection {
            info,
            link: Arc::new(link),
        },
    );

    let worker_shared = Arc::clone(shared);
    let spawned = std::thread::Builder::new()
        .name(format!("linkvue-peer-{}", &id.simple().to_string()[..8]))
        .spawn(move || receive_loop(&worker_shared, id, reader, Role::Host));

    match spawned {
        Ok(handle) => {
            let mut workers = shared.workers();
            workers.retain(|h| !h.is_finished());
            workers.push(handle);
        }
        Err(e) => {
            error!("could not spawn receive thread for {addr}: {e}");
            shared.drop_peer(id);
        }
    }
}

/// Reads frames from one connection until it closes.
fn receive_loop(shared: &Shared, id: PeerId, mut reader: LinkReader, role: Role) {
    loop {
        match reader.receive() {
            Ok(Some(payload)) if payload.is_empty() => continue,
            Ok(Some(payload)) => {
                debug!("{} byte(s) from {id}", payload.len());
                if role == Role::Host {
                    shared.relay_from(id, &payload);
                }
                shared.sink.on_message_received(id, payload);
            }
            Ok(None) => {
                debug!("peer {id} closed the connection");
                break;
            }
            Err(e) => {
                if shared.running.load(Ordering::SeqCst) {
                    warn!("receive from {id} failed: {e}");
                }
                break;
            }
        }
    }

    shared.drop_peer(id);
    if role == Role::Client && shared.running.load(Ordering::SeqCst) {
        warn!("lost connection to host; session ended");
        shared.set_state(SessionState::Stopped);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
