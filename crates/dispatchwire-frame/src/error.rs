use crate::codec::MAGIC;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the magic number; the stream is
    /// out of sync.
    #[error("invalid frame magic 0x{found:08x} (expected 0x{:08x})", MAGIC)]
    InvalidMagic { found: u32 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the byte stream itself can no longer be trusted.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidMagic { .. } | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
