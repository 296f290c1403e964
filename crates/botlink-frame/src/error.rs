/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header's length field exceeds the configured maximum.
    ///
    /// Recovered by resynchronization: the decoder drops the marker and
    /// rescans.
    #[error("frame length out of range on topic {topic} ({len} bytes, max {max})")]
    LengthOutOfRange { topic: u16, len: usize, max: usize },

    /// The frame trailer does not match the computed checksum.
    ///
    /// Recovered by resynchronization: the decoder drops the marker and
    /// rescans.
    #[error("checksum mismatch on topic {topic} (expected {expected:#06x}, computed {actual:#06x})")]
    ChecksumMismatch {
        topic: u16,
        expected: u16,
        actual: u16,
    },

    /// The payload exceeds the maximum encodable size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("link closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Framing errors are recovered by resynchronizing on the next marker;
    /// everything else ends the session.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::LengthOutOfRange { .. } | FrameError::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
