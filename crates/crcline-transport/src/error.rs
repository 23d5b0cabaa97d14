/// Errors that can occur while moving bytes over a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying handle.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the stream.
    #[error("stream closed by peer")]
    Closed,

    /// Failed to open the named device.
    #[cfg(feature = "serial")]
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
