//! linkvue-peer library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a peer do? (for beginners)
//!
//! Every LinkVue instance is a *peer*.  A peer runs in one of two roles:
//!
//! - **Host** – listens on a TCP port, accepts any number of clients, and
//!   relays every snapshot it receives to all the *other* clients.
//! - **Client** – connects to exactly one host and exchanges snapshots with it.
//!
//! Networking happens on background threads owned by the
//! [`ConnectionManager`](infrastructure::network::connection_manager::ConnectionManager).
//! Received snapshots are queued in the
//! [`MessageRelay`](application::relay::MessageRelay) and applied to the
//! document only by the owning loop through the
//! [`SyncSession`](application::session::SyncSession).

/// Application layer: message relay and the per-frame sync session.
pub mod application;

/// Infrastructure layer: sockets, connection management, config files.
pub mod infrastructure;
