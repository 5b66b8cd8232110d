//! Network infrastructure for the peer.
//!
//! # Sub-modules
//!
//! - **`transport`** – Thin wrappers over `std::net` sockets: a non-blocking
//!   listening endpoint and a framed, write-locked peer link.  These are the
//!   only types in the crate that touch sockets directly.
//!
//! - **`connection_manager`** – Owns the host/client role, the accept thread,
//!   one receive thread per connection, the peer set, and broadcast fan-out.
//!   Reports activity through the [`PeerEventSink`](connection_manager::PeerEventSink)
//!   trait.

pub mod connection_manager;
pub mod transport;
