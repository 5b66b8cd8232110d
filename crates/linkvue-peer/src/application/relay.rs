//! MessageRelay: the inbox between network threads and the owning loop.
//!
//! Network threads call [`PeerEventSink`] methods on the relay; the owning
//! loop calls [`MessageRelay::drain`] once per tick and applies what it gets.
//! The relay never looks inside a payload.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::infrastructure::network::connection_manager::{PeerEventSink, PeerId};

/// Mutex-guarded FIFO of received payloads plus connection counters.
#[derive(Debug, Default)]
pub struct MessageRelay {
    inbound: Mutex<Vec<Vec<u8>>>,
    connected_peers: AtomicUsize,
    received_total: AtomicU64,
}

impl MessageRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn inbound(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one payload to the inbox.
    pub fn push(&self, payload: Vec<u8>) {
        self.inbound().push(payload);
        self.received_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes every queued payload, oldest first, leaving the inbox empty.
    ///
    /// The queue is swapped out under the lock, so a payload pushed
    /// concurrently lands either in this batch or in the next one.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.inbound())
    }

    /// Discards everything queued and returns how many payloads were dropped.
    pub fn clear(&self) -> usize {
        let dropped = self.drain().len();
        if dropped > 0 {
            info!("discarded {dropped} unapplied snapshot(s)");
        }
        dropped
    }

    /// Number of payloads waiting to be drained.
    pub fn pending(&self) -> usize {
        self.inbound().len()
    }

    pub fn connected_peers(&self) -> usize {
        self.connected_peers.load(Ordering::SeqCst)
    }

    /// Payloads received since the relay was created, drained or not.
    pub fn received_total(&self) -> u64 {
        self.received_total.load(Ordering::Relaxed)
    }
}

impl PeerEventSink for MessageRelay {
    fn on_message_received(&self, from: PeerId, payload: Vec<u8>) {
        debug!("queued {} byte(s) from {from}", payload.len());
        self.push(payload);
    }

    fn on_peer_connected(&self, peer: PeerId, addr: SocketAddr) {
        let now = self.connected_peers.fetch_add(1, Ordering::SeqCst) + 1;
        info!("peer {peer} joined from {addr} ({now} connected)");
    }

    fn on_peer_disconnected(&self, peer: PeerId) {
        let previous = self
            .connected_peers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        info!(
            "peer {peer} left ({} connected)",
            previous.saturating_sub(1)
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
