//! Socket primitives used by the connection manager.
//!
//! The rest of the crate only ever sees these types:
//!
//! | Primitive | Type / method                         |
//! |-----------|---------------------------------------|
//! | listen    | [`Listener::bind`]                    |
//! | accept    | [`Listener::accept`]                  |
//! | connect   | [`PeerLink::connect`]                 |
//! | send      | [`PeerLink::send`]                    |
//! | receive   | [`LinkReader::receive`]               |
//! | close     | [`PeerLink::close`]                   |
//!
//! # Threading
//!
//! A connection is split into a [`PeerLink`] (shared, used for writing and
//! closing from any thread) and a [`LinkReader`] (owned by exactly one receive
//! thread).  Both wrap clones of the same OS socket, so closing the link wakes
//! up a reader blocked in `receive`.

use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use linkvue_core::protocol::framing::{read_frame, write_frame, FrameError};
use tracing::debug;

// ── Listening endpoint ────────────────────────────────────────────────────────

/// A bound, non-blocking TCP listening socket.
///
/// The socket is non-blocking so the accept loop can notice a shutdown
/// request between polls instead of sitting in `accept()` forever.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Binds and listens on `addr`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the address is in use, privileged, or invalid.
    pub fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let inner = TcpListener::bind(addr)?;
        inner.set_nonblocking(true)?;
        let local_addr = inner.local_addr()?;
        Ok(Self { inner, local_addr })
    }

    /// The address actually bound (resolves port `0` to the OS-assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one pending connection, if any.
    ///
    /// Returns `Ok(None)` when no connection is waiting.
    ///
    /// # Errors
    ///
    /// Any accept error other than "would block", e.g. descriptor exhaustion.
    pub fn accept(&self) -> std::io::Result<Option<(PeerLink, LinkReader)>> {
        match self.inner.accept() {
            Ok((stream, _)) => {
                // Accepted sockets may inherit the listener's non-blocking flag.
                stream.set_nonblocking(false)?;
                PeerLink::from_stream(stream).map(Some)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ── Peer link ─────────────────────────────────────────────────────────────────

/// Write/close side of one connection.
pub struct PeerLink {
    /// Serialises writers so frames from concurrent senders never interleave.
    writer: Mutex<TcpStream>,
    /// Unlocked handle used only for `shutdown`, so closing never waits behind
    /// a writer stuck on backpressure.
    control: TcpStream,
    remote_addr: SocketAddr,
}

/// Read side of one connection; owned by a single receive thread.
pub struct LinkReader {
    stream: TcpStream,
}

impl PeerLink {
    /// Opens an outbound connection, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the OS error for refused, unreachable, or timed-out connects.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> std::io::Result<(Self, LinkReader)> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> std::io::Result<(Self, LinkReader)> {
        // Snapshots are sent whole; Nagle only adds latency here.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle: {e}");
        }
        let remote_addr = stream.peer_addr()?;
        let control = stream.try_clone()?;
        let reader = LinkReader {
            stream: stream.try_clone()?,
        };
        let link = Self {
            writer: Mutex::new(stream),
            control,
            remote_addr,
        };
        Ok((link, reader))
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Local end of the socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.control.local_addr()
    }

    /// Sends one framed payload.  Blocks while the socket applies backpressure.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] for empty/oversized payloads or write failures.
    pub fn send(&self, payload: &[u8]) -> Result<(), FrameError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_frame(&mut *writer, payload)
    }

    /// Shuts the socket down in both directions.
    ///
    /// Unblocks the paired [`LinkReader`].  Closing an already closed link is
    /// harmless.
    pub fn close(&self) {
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            if e.kind() != ErrorKind::NotConnected {
                debug!("shutdown of {} failed: {e}", self.remote_addr);
            }
        }
    }
}

impl LinkReader {
    /// Blocks until one frame arrives.
    ///
    /// `Ok(None)` means the remote side closed the connection.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] for read failures or corrupt framing.
    pub fn receive(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        read_frame(&mut self.stream)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
