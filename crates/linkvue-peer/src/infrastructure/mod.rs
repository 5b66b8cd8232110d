//! Infrastructure layer for the peer.
//!
//! Contains OS-facing adapters: TCP sockets, the connection manager that
//! drives them on background threads, and file-system config storage.
//!
//! **Dependency rule**: nothing in here knows about the document model; the
//! network layer moves opaque byte payloads only.

pub mod network;
pub mod storage;
