use bytes::BytesMut;
use crcline_transport::ByteStream;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 128;

/// Formats payloads as checksummed lines and writes them to a [`ByteStream`].
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    eol: u8,
}

impl FrameWriter {
    /// Create a frame writer with the default LF terminator.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a frame writer with an explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            eol: config.eol,
        }
    }

    /// Encode `payload` and write the whole frame, then flush.
    ///
    /// No acknowledgement is awaited.
    pub fn send<S: ByteStream + ?Sized>(&mut self, stream: &mut S, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(payload, self.eol, &mut self.buf)?;
        trace!(bytes = self.buf.len(), "writing frame");
        stream.write_all(&self.buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Terminator appended to each frame.
    pub fn eol(&self) -> u8 {
        self.eol
    }

    pub fn set_eol(&mut self, eol: u8) {
        self.eol = eol;
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}
