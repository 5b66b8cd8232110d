//! Application layer for the peer.
//!
//! # Sub-modules
//!
//! - **`relay`**   – [`MessageRelay`](relay::MessageRelay), the thread-safe
//!   inbox between the network threads and the owning loop.  It implements the
//!   connection manager's event-sink trait, so the network layer never knows
//!   a document exists.
//!
//! - **`session`** – [`SyncSession`](session::SyncSession), the per-frame use
//!   case: apply received snapshots, publish local edits.  It owns the
//!   document and is the only code that mutates it.

pub mod relay;
pub mod session;
