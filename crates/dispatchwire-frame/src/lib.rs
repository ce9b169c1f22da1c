//! Length-prefixed message framing for the dispatcher wire protocol.
//!
//! Every message is framed with an 8-byte header in host byte order:
//! - A 4-byte magic number (`0xdeadbeef`) for stream synchronization
//! - A 4-byte payload length
//!
//! The payload follows untransformed. No partial reads, no buffer management
//! in user code.

pub mod codec;
pub mod error;
pub mod reader;
#[cfg(feature = "async")]
pub mod wire_codec;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, WireHeader, HEADER_SIZE, MAGIC, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
#[cfg(feature = "async")]
pub use wire_codec::WireCodec;
pub use writer::FrameWriter;
