use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::error::{Result, TransportError};

const READ_CHUNK_SIZE: usize = 256;

/// How long a write may make no progress before it fails.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A poll-style byte stream with one byte of lookahead.
///
/// Reads never block: `Ok(None)` means no byte is ready at the moment, not
/// end of data. Callers bound their waiting with a [`crate::Deadline`].
pub trait ByteStream {
    /// Consume the next byte if one is ready.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Look at the next byte without consuming it.
    fn peek_byte(&mut self) -> Result<Option<u8>>;

    /// True if at least one byte can be read right now.
    fn bytes_available(&mut self) -> Result<bool>;

    /// Write every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Push buffered output to the device.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        (**self).peek_byte()
    }

    fn bytes_available(&mut self) -> Result<bool> {
        (**self).bytes_available()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        (**self).peek_byte()
    }

    fn bytes_available(&mut self) -> Result<bool> {
        (**self).bytes_available()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Adapts any non-blocking `Read + Write` handle into a [`ByteStream`].
///
/// The handle must not block indefinitely on read: non-blocking sockets
/// (`WouldBlock`) and devices with a short read timeout (`TimedOut`) both
/// report "no byte ready". Bytes pulled from the handle are kept in a small
/// lookahead buffer so `peek_byte` never loses data.
///
/// Writes that stall (`WouldBlock`/`TimedOut` with no bytes accepted) yield
/// and retry until the write timeout, then fail with `TimedOut`.
pub struct IoStream<T> {
    inner: T,
    pending: BytesMut,
    write_timeout: Duration,
}

impl<T: Read + Write> IoStream<T> {
    /// Wrap a handle that is already configured for non-blocking reads.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Longest a write or flush may stall before giving up.
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = timeout;
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Number of bytes already pulled from the handle but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Borrow the underlying handle.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying handle.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the adapter and return the handle. Buffered bytes are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn fill(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            return Ok(());
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    trace!(bytes = n, "filled lookahead buffer");
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(())
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T: Read + Write> ByteStream for IoStream<T> {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.fill()?;
        if self.pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.pending.get_u8()))
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        self.fill()?;
        Ok(self.pending.first().copied())
    }

    fn bytes_available(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(!self.pending.is_empty())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        let mut stalled_since = Instant::now();
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    offset += n;
                    stalled_since = Instant::now();
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) => wait_or_give_up(stalled_since, self.write_timeout)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let stalled_since = Instant::now();
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) => wait_or_give_up(stalled_since, self.write_timeout)?,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

fn is_stall(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn wait_or_give_up(stalled_since: Instant, limit: Duration) -> Result<()> {
    if stalled_since.elapsed() >= limit {
        return Err(TransportError::Io(io::Error::new(
            ErrorKind::TimedOut,
            format!("write stalled for {limit:?}"),
        )));
    }
    thread::yield_now();
    Ok(())
}

#[cfg(unix)]
impl IoStream<std::os::unix::net::UnixStream> {
    /// Wrap a Unix socket, switching it to non-blocking mode.
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self::new(stream))
    }
}

impl<T> std::fmt::Debug for IoStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStream")
            .field("buffered", &self.pending.len())
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
