use crcline_transport::TransportError;

/// Errors that can occur while framing or unframing a line.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No complete line arrived before the deadline.
    #[error("timed out waiting for a line")]
    Timeout,

    /// The line has no `,<decimal>` checksum suffix.
    #[error("line has no checksum suffix")]
    Malformed,

    /// The checksum suffix disagrees with the payload.
    #[error("checksum mismatch (frame carries {expected}, payload hashes to {actual})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// The payload does not start with the requested prefix.
    #[error("payload does not start with the expected prefix")]
    PrefixMismatch,

    /// The line did not fit in the receive buffer.
    #[error("line exceeds receive buffer ({capacity} bytes)")]
    Overflow { capacity: usize },

    /// The receive buffer cannot hold even the terminator byte.
    #[error("receive buffer must hold at least one byte")]
    BufferTooSmall,

    /// The payload contains CR or LF and cannot be sent as a single line.
    #[error("payload contains a line terminator")]
    EmbeddedTerminator,

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// True for per-line failures that a receiver skips before reading the next line.
    pub fn is_discardable(&self) -> bool {
        matches!(
            self,
            FrameError::Malformed
                | FrameError::ChecksumMismatch { .. }
                | FrameError::PrefixMismatch
                | FrameError::Overflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
