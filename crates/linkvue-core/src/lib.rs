//! # linkvue-core
//!
//! Shared library for LinkVue containing the drawing document model, its
//! undo/redo history, the JSON snapshot codec and the length-prefixed stream
//! framing used on the wire.
//!
//! This crate is used by every peer, whether it hosts or joins a session.
//! It has zero dependencies on OS APIs, UI frameworks, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! LinkVue is a shared whiteboard: several people draw on the same canvas and
//! every stroke shows up on every screen.  One peer (the *host*) listens for
//! connections; the others (the *clients*) connect to it.  Whenever someone
//! draws, their peer serialises its whole document and sends it out; whoever
//! receives it replaces their own document with the snapshot.
//!
//! - **`domain`** – The document itself: points, strokes, drawing settings,
//!   the undo/redo snapshot stacks and the canvas view transform.  Pure data
//!   and rules, no I/O.
//!
//! - **`protocol`** – How a document travels.  The codec turns a document into
//!   a JSON text snapshot and back; the framing module wraps each snapshot in
//!   a 4-byte length prefix so a byte stream can be split back into messages.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `linkvue_core::Document` instead of `linkvue_core::domain::document::Document`.
pub use domain::document::{Color, Document, Point, Stroke};
pub use domain::history::History;
pub use protocol::codec::{decode_document, encode_document, CodecError, DocumentPatch};
pub use protocol::framing::{read_frame, write_frame, FrameError, MAX_FRAME_LEN};
