use std::time::Duration;

use crcline_frame::FrameError;
use crcline_transport::TransportError;

/// Errors surfaced by [`crate::Connection`].
///
/// Per-line failures (bad checksum, missing checksum, wrong prefix, overflow)
/// are retried internally and only ever show up as [`LinkError::Timeout`].
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No acceptable line arrived in time.
    #[error("no valid line received within {0:?}")]
    Timeout(Duration),

    /// The request itself cannot be framed or received.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout(_))
    }
}

impl From<FrameError> for LinkError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => LinkError::Transport(err),
            other => LinkError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
