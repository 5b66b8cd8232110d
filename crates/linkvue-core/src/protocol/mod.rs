//! Protocol module containing the snapshot codec and the stream framing.

pub mod codec;
pub mod framing;

pub use codec::{decode_document, encode_document, CodecError, DocumentPatch};
pub use framing::{read_frame, write_frame, FrameError, MAX_FRAME_LEN};
