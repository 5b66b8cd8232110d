//! SyncSession: keeps the local document in step with the other peers.
//!
//! The session is the single owner of the [`Document`].  Everything the UI
//! does goes through [`SyncSession::document_mut`]; everything the network
//! delivers goes through [`SyncSession::drain_inbound`].  Both happen on the
//! same thread, so the document needs no lock.
//!
//! # One tick (for beginners)
//!
//! The owning loop calls [`SyncSession::tick`] once per frame:
//!
//! 1. **Drain** – take every snapshot the relay queued since the last tick and
//!    apply them oldest first.  Each one replaces the document wholesale, so
//!    the last one wins.  Malformed snapshots are logged and skipped.
//! 2. **Publish** – if the user changed the document since the last publish,
//!    serialise it once and send it: to the host when we are a client, to every
//!    peer when we are the host.
//!
//! # Change tracking
//!
//! [`Document::revision`] goes up on every content change.  The session
//! remembers the revision it last published.  After applying remote snapshots
//! it adopts the resulting revision as published, so a snapshot that came in
//! from the network is never bounced back out.

use std::sync::Arc;

use linkvue_core::protocol::codec::{decode_document, encode_document, CodecError};
use linkvue_core::Document;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::relay::MessageRelay;
use crate::infrastructure::network::connection_manager::{
    ConnectionManager, NetworkError, Role, SessionState,
};

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("snapshot encoding failed: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// The outbound side of the network as the session sees it.
///
/// Implemented by [`ConnectionManager`]; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotTransport: Send {
    /// Role chosen at initialize, if any.
    fn role(&self) -> Option<Role>;
    /// `true` while outbound messages can be delivered.
    fn is_connected(&self) -> bool;
    fn send_message(&self, payload: &[u8]) -> Result<(), NetworkError>;
    fn broadcast_message(&self, payload: &[u8]) -> Result<usize, NetworkError>;
    fn stop(&mut self);
}

impl SnapshotTransport for ConnectionManager {
    fn role(&self) -> Option<Role> {
        ConnectionManager::role(self)
    }

    fn is_connected(&self) -> bool {
        self.is_running()
            && matches!(
                self.state(),
                SessionState::HostAccepting | SessionState::ClientConnected
            )
    }

    fn send_message(&self, payload: &[u8]) -> Result<(), NetworkError> {
        ConnectionManager::send_message(self, payload)
    }

    fn broadcast_message(&self, payload: &[u8]) -> Result<usize, NetworkError> {
        ConnectionManager::broadcast_message(self, payload)
    }

    fn stop(&mut self) {
        ConnectionManager::stop(self);
    }
}

/// Result of applying the relay's queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Snapshots decoded and applied.
    pub applied: usize,
    /// Snapshots discarded as malformed.
    pub rejected: usize,
}

/// What [`SyncSession::publish`] did with the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Client role: sent to the host.
    Sent,
    /// Host role: written to `delivered` peers.
    Broadcast { delivered: usize },
    /// No transport attached or not connected; nothing was sent.
    Offline,
}

/// Result of one [`SyncSession::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub drained: DrainReport,
    /// `true` if a snapshot went out this tick.
    pub published: bool,
}

/// Owns the document and moves snapshots between it and the network.
pub struct SyncSession {
    document: Document,
    relay: Arc<MessageRelay>,
    transport: Option<Box<dyn SnapshotTransport>>,
    published_revision: u64,
}

impl SyncSession {
    /// Creates an offline session around `document`.
    ///
    /// The document as given counts as already published.
    pub fn new(document: Document, relay: Arc<MessageRelay>) -> Self {
        let published_revision = document.revision();
        Self {
            document,
            relay,
            transport: None,
            published_revision,
        }
    }

    /// Creates a session that publishes through `transport`.
    pub fn with_transport(
        document: Document,
        relay: Arc<MessageRelay>,
        transport: Box<dyn SnapshotTransport>,
    ) -> Self {
        let mut session = Self::new(document, relay);
        session.transport = Some(transport);
        session
    }

    /// Attaches a transport, stopping and returning any previous one.
    pub fn attach(
        &mut self,
        transport: Box<dyn SnapshotTransport>,
    ) -> Option<Box<dyn SnapshotTransport>> {
        let previous = self.detach();
        self.transport = Some(transport);
        previous
    }

    /// Detaches the transport after stopping it.  Drawing continues locally.
    pub fn detach(&mut self) -> Option<Box<dyn SnapshotTransport>> {
        let mut transport = self.transport.take()?;
        transport.stop();
        Some(transport)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for local editing: strokes, undo/redo, colours,
    /// thickness, zoom and pan.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn relay(&self) -> &Arc<MessageRelay> {
        &self.relay
    }

    pub fn is_online(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.is_connected())
    }

    /// Applies every queued snapshot in arrival order.
    ///
    /// A malformed snapshot is logged, counted and skipped; the document is
    /// untouched by it.
    pub fn drain_inbound(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        for payload in self.relay.drain() {
            match decode_document(&payload, &mut self.document) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("discarding malformed snapshot ({} bytes): {e}", payload.len());
                    report.rejected += 1;
                }
            }
        }
        if report.applied > 0 {
            self.published_revision = self.document.revision();
            debug!(
                "applied {} remote snapshot(s), {} stroke(s) now",
                report.applied,
                self.document.strokes().len()
            );
        }
        report
    }

    /// `true` if the document changed locally since the last publish.
    ///
    /// Panning is view-local and never counts.
    pub fn has_local_changes(&self) -> bool {
        self.document.revision() != self.published_revision
    }

    /// Serialises the whole document as one JSON snapshot.
    ///
    /// # Errors
    ///
    /// [`CodecError`] if a value cannot be represented in JSON.
    pub fn serialize_current(&self) -> Result<String, CodecError> {
        encode_document(&self.document)
    }

    /// Sends the current document according to the role.
    ///
    /// On success the current revision counts as published.  A host whose
    /// broadcast lost some peers still counts as published; the lost peers
    /// are already disconnected.
    ///
    /// # Errors
    ///
    /// [`SessionError::Codec`] or [`SessionError::Network`] for a failed client
    /// send or a role/state error.
    pub fn publish(&mut self) -> Result<PublishOutcome, SessionError> {
        let transport = match self.transport.as_ref() {
            Some(t) if t.is_connected() => t,
            _ => return Ok(PublishOutcome::Offline),
        };
        let snapshot = encode_document(&self.document)?;

        let outcome = match transport.role() {
            Some(Role::Client) => {
                transport.send_message(snapshot.as_bytes())?;
                PublishOutcome::Sent
            }
            Some(Role::Host) => match transport.broadcast_message(snapshot.as_bytes()) {
                Ok(delivered) => PublishOutcome::Broadcast { delivered },
                Err(NetworkError::PartialBroadcast { delivered, failed }) => {
                    warn!("{} peer(s) dropped during broadcast", failed.len());
                    PublishOutcome::Broadcast { delivered }
                }
                Err(e) => return Err(e.into()),
            },
            None => return Err(NetworkError::NotInitialized.into()),
        };

        self.published_revision = self.document.revision();
        debug!("published {} byte snapshot: {outcome:?}", snapshot.len());
        Ok(outcome)
    }

    /// Drains the inbox, then publishes local changes if there are any.
    ///
    /// Never fails: publish errors are logged and the change stays pending
    /// for the next tick.
    pub fn tick(&mut self) -> TickReport {
        let drained = self.drain_inbound();
        let mut published = false;

        if self.has_local_changes() && self.is_online() {
            match self.publish() {
                Ok(PublishOutcome::Offline) => {}
                Ok(_) => published = true,
                Err(e) => warn!("publish failed: {e}"),
            }
        }

        TickReport { drained, published }
    }

    /// Stops the transport and discards unapplied snapshots.
    pub fn shutdown(&mut self) {
        if self.detach().is_some() {
            info!("sync session detached from the network");
        }
        self.relay.clear();
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
