use std::time::Duration;

use crcline_frame::{strip_prefix, verify, FrameError, FrameWriter, LineReader};
use crcline_transport::{ByteStream, Clock, Deadline, SystemClock};
use tracing::debug;

use crate::config::LinkConfig;
use crate::diag::{DiagnosticSink, Diagnostics};
use crate::error::{LinkError, Result};

/// One end of a CRC16 line link, bound to a single stream for its lifetime.
///
/// All waits are polls bounded by a deadline from the connection's clock;
/// there is no other cancellation. Only one send or receive runs at a time,
/// enforced by `&mut self`.
#[derive(Debug)]
pub struct Connection<S, C = SystemClock> {
    stream: S,
    clock: C,
    reader: LineReader,
    writer: FrameWriter,
    config: LinkConfig,
    diag: Diagnostics,
}

impl<S: ByteStream> Connection<S, SystemClock> {
    /// Bind `stream` with the default configuration and the system clock.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, SystemClock::new(), LinkConfig::default())
    }
}

impl<S: ByteStream, C: Clock> Connection<S, C> {
    /// Bind `stream` with an explicit clock and configuration.
    pub fn with_config(stream: S, clock: C, config: LinkConfig) -> Self {
        let frame_config = config.frame_config();
        Self {
            stream,
            clock,
            reader: LineReader::new(&frame_config),
            writer: FrameWriter::with_config(&frame_config),
            config,
            diag: Diagnostics::new(),
        }
    }

    /// Echo activity to `sink`.
    pub fn set_diag(&mut self, sink: impl DiagnosticSink + 'static) {
        self.diag.set_sink(sink);
    }

    pub fn clear_diag(&mut self) {
        self.diag.clear_sink();
    }

    /// Send `payload` as one checksummed line. No acknowledgement is awaited.
    pub fn send_data(&mut self, payload: &[u8]) -> Result<()> {
        self.diag.print("sendLine: '");
        self.diag.print(&*String::from_utf8_lossy(payload));
        self.diag.println("'");

        self.writer.send(&mut self.stream, payload)?;
        debug!(size = payload.len(), "sent line");
        Ok(())
    }

    /// Receive the next valid line into `buf`, returning the payload length.
    ///
    /// The payload (checksum stripped) is copied to the front of `buf`,
    /// followed by a `0` byte, so at most `buf.len() - 1` payload bytes fit.
    /// Invalid lines are skipped until `timeout` has elapsed in total.
    pub fn receive_data(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.receive_matching(None, buf, timeout)
    }

    /// Like [`Self::receive_data`], but only accepts payloads starting with
    /// `prefix`, and removes the prefix before returning.
    pub fn receive_data_with_prefix(
        &mut self,
        prefix: &[u8],
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        self.receive_matching(Some(prefix), buf, timeout)
    }

    /// [`Self::receive_data`] with the configured default timeout.
    pub fn receive_data_default(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.receive_data(buf, self.config.default_timeout)
    }

    /// [`Self::receive_data_with_prefix`] with the configured default timeout.
    pub fn receive_data_with_prefix_default(
        &mut self,
        prefix: &[u8],
        buf: &mut [u8],
    ) -> Result<usize> {
        self.receive_data_with_prefix(prefix, buf, self.config.default_timeout)
    }

    /// Wait until at least one byte can be read, without consuming it.
    ///
    /// Returns `false` if nothing arrived within `timeout`.
    pub fn wait_until_available(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Deadline::from_clock(&self.clock, millis(timeout));
        while !deadline.is_expired(self.clock.now_millis()) {
            if self.stream.bytes_available()? {
                return Ok(true);
            }
            self.clock.relax();
        }
        Ok(false)
    }

    /// [`Self::wait_until_available`] with the configured default timeout.
    pub fn wait_until_available_default(&mut self) -> Result<bool> {
        self.wait_until_available(self.config.default_timeout)
    }

    /// Discard every byte that is ready right now, returning how many.
    pub fn flush_input(&mut self) -> Result<usize> {
        let mut discarded = 0usize;
        while self.stream.read_byte()?.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "flushed input");
        }
        Ok(discarded)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the connection and return the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current connection configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn receive_matching(
        &mut self,
        prefix: Option<&[u8]>,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let deadline = Deadline::from_clock(&self.clock, millis(timeout));

        while !deadline.is_expired(self.clock.now_millis()) {
            let len = match self
                .reader
                .read_line(&mut self.stream, &self.clock, buf, deadline)
            {
                Ok(len) => len,
                Err(FrameError::Timeout) => break,
                Err(err) if err.is_discardable() => {
                    debug!(error = %err, "discarding line");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match accept(&buf[..len], prefix) {
                Ok((start, size)) => {
                    buf.copy_within(start..start + size, 0);
                    buf[size] = 0;
                    debug!(size, "received line");
                    return Ok(size);
                }
                Err(err) if err.is_discardable() => {
                    debug!(error = %err, "discarding line");
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.diag.println("receiveData timed out");
        Err(LinkError::Timeout(timeout))
    }
}

/// Validate a raw line and locate the part handed to the caller.
///
/// Returns `(start, len)` of the payload within `line`.
fn accept(line: &[u8], prefix: Option<&[u8]>) -> crcline_frame::Result<(usize, usize)> {
    let payload = verify(line)?;
    match prefix {
        Some(prefix) => {
            let rest = strip_prefix(payload, prefix)?;
            Ok((prefix.len(), rest.len()))
        }
        None => Ok((0, payload.len())),
    }
}

fn millis(timeout: Duration) -> u32 {
    // Deadlines compare by wrapping subtraction, so stay below 2^31 ms.
    u32::try_from(timeout.as_millis())
        .unwrap_or(u32::MAX)
        .min(i32::MAX as u32)
}

#[cfg(test)]
mod tests {
    use crcline_frame::OverflowPolicy;
    use crcline_transport::sim::{ScriptedStream, SimClock};
    use crcline_transport::TransportError;

    use super::*;
    use crate::diag::MemorySink;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn connection() -> (SimClock, Connection<ScriptedStream, SimClock>) {
        connection_with(LinkConfig::default())
    }

    fn connection_with(config: LinkConfig) -> (SimClock, Connection<ScriptedStream, SimClock>) {
        let clock = SimClock::new();
        let stream = ScriptedStream::new(clock.clone());
        (clock.clone(), Connection::with_config(stream, clock, config))
    }

    #[test]
    fn send_data_writes_checksummed_line() {
        let (_, mut conn) = connection();
        conn.send_data(b"CMD=1").unwrap();
        assert_eq!(conn.get_ref().written(), b"CMD=1,15478\n");
    }

    #[test]
    fn send_data_uses_configured_terminator() {
        let (_, mut conn) = connection_with(LinkConfig {
            eol: b'\r',
            ..LinkConfig::default()
        });
        conn.send_data(b"AB").unwrap();
        assert_eq!(conn.get_ref().written(), b"AB,22139\r");
    }

    #[test]
    fn send_data_echoes_to_diagnostics() {
        let (_, mut conn) = connection();
        let sink = MemorySink::new();
        conn.set_diag(sink.clone());

        conn.send_data(b"hello").unwrap();
        assert_eq!(sink.contents(), "sendLine: 'hello'\r\n");
    }

    #[test]
    fn send_data_rejects_embedded_newline() {
        let (_, mut conn) = connection();
        let err = conn.send_data(b"a\nb").unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::EmbeddedTerminator)));
        assert!(conn.get_ref().written().is_empty());
    }

    #[test]
    fn receive_strips_checksum_and_terminates() {
        let (_, mut conn) = connection();
        conn.get_mut().push(b"STATUS=ok,28541\r\n");

        let mut buf = [0xEEu8; 32];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"STATUS=ok");
        assert_eq!(buf[len], 0);
    }

    #[test]
    fn receive_keeps_commas_inside_payload() {
        let (_, mut conn) = connection();
        conn.get_mut().push(b"a,b,41780\n");

        let mut buf = [0u8; 32];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"a,b");
    }

    #[test]
    fn receive_retries_until_valid_line() {
        let (_, mut conn) = connection();
        conn.get_mut()
            .push(b"hello,1\n")
            .push_after(300, b"hello,50018\n");

        let mut buf = [0u8; 32];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }

    #[test]
    fn receive_times_out_before_delayed_valid_line() {
        let (clock, mut conn) = connection();
        conn.get_mut()
            .push(b"hello,1\n")
            .push_after(300, b"hello,50018\n");

        let mut buf = [0u8; 32];
        let err = conn.receive_data(&mut buf, ms(200)).unwrap_err();
        assert!(matches!(err, LinkError::Timeout(t) if t == ms(200)));
        assert_eq!(clock.now_millis(), 200);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (_, mut conn) = connection();
        conn.get_mut()
            .push(b"no checksum here\n")
            .push(b"bad,suffix\n")
            .push(b"A,22757\n");

        let mut buf = [0u8; 32];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"A");
    }

    #[test]
    fn deadline_is_not_reset_by_garbage() {
        let (clock, mut conn) = connection();
        for i in 0..20 {
            conn.get_mut().push_after(i * 25, b"junk,0\n");
        }

        let mut buf = [0u8; 32];
        let err = conn.receive_data(&mut buf, ms(200)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(clock.now_millis(), 200);
    }

    #[test]
    fn idle_receive_times_out_after_timeout() {
        let (clock, mut conn) = connection();
        let sink = MemorySink::new();
        conn.set_diag(sink.clone());

        let mut buf = [0u8; 32];
        let err = conn.receive_data(&mut buf, ms(200)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(clock.now_millis(), 200);
        assert_eq!(sink.contents(), "receiveData timed out\r\n");
    }

    #[test]
    fn default_timeout_comes_from_config() {
        let (clock, mut conn) = connection_with(LinkConfig {
            default_timeout: ms(75),
            ..LinkConfig::default()
        });

        let mut buf = [0u8; 8];
        assert!(conn.receive_data_default(&mut buf).unwrap_err().is_timeout());
        assert_eq!(clock.now_millis(), 75);
        assert!(conn
            .receive_data_with_prefix_default(b"X", &mut buf)
            .unwrap_err()
            .is_timeout());
        assert_eq!(clock.now_millis(), 150);
    }

    #[test]
    fn prefix_filter_skips_other_lines_and_strips_prefix() {
        let (_, mut conn) = connection();
        conn.get_mut()
            .push(b"OTHER,63449\n")
            .push(b"CMD=1,15478\n");

        let mut buf = [0u8; 32];
        let len = conn
            .receive_data_with_prefix(b"CMD", &mut buf, ms(1000))
            .unwrap();
        assert_eq!(&buf[..len], b"=1");
        assert_eq!(buf[len], 0);
    }

    #[test]
    fn padded_checksum_suffix_is_accepted() {
        let (_, mut conn) = connection();
        conn.get_mut().push(b"hello,50018 \r\n");

        let mut buf = [0u8; 32];
        let len = conn.receive_data(&mut buf, ms(100)).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }

    #[test]
    fn prefix_filter_still_requires_valid_checksum() {
        let (_, mut conn) = connection();
        conn.get_mut()
            .push(b"CMD=reset,1\n")
            .push(b"CMD=reset,22730\n");

        let mut buf = [0u8; 32];
        let len = conn
            .receive_data_with_prefix(b"CMD=", &mut buf, ms(1000))
            .unwrap();
        assert_eq!(&buf[..len], b"reset");
    }

    #[test]
    fn prefix_filter_times_out_without_match() {
        let (_, mut conn) = connection();
        conn.get_mut().push(b"OTHER,63449\n");

        let mut buf = [0u8; 32];
        let err = conn
            .receive_data_with_prefix(b"CMD", &mut buf, ms(100))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn truncated_line_fails_checksum_and_is_retried() {
        let (_, mut conn) = connection();
        conn.get_mut()
            .push(b"STATUS=ok,28541\n")
            .push(b"A,22757\n");

        // Room for 8 bytes: "STATUS=o" survives, which has no checksum suffix.
        let mut buf = [0u8; 9];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"A");
    }

    #[test]
    fn overflow_rejection_skips_long_lines() {
        let (_, mut conn) = connection_with(LinkConfig {
            overflow: OverflowPolicy::Reject,
            ..LinkConfig::default()
        });
        // Truncated to "a,b,4178" this would decode but fail the checksum;
        // with rejection it never reaches the codec at all.
        conn.get_mut().push(b"a,b,41780\n").push(b"A,22757\n");

        let mut buf = [0u8; 9];
        let len = conn.receive_data(&mut buf, ms(1000)).unwrap();
        assert_eq!(&buf[..len], b"A");
    }

    #[test]
    fn empty_buffer_is_an_error_not_a_timeout() {
        let (_, mut conn) = connection();
        let err = conn.receive_data(&mut [], ms(100)).unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::BufferTooSmall)));
    }

    #[test]
    fn wait_until_available_does_not_consume() {
        let (clock, mut conn) = connection();
        conn.get_mut().push_after(30, b"A,22757\n");

        assert!(conn.wait_until_available(ms(100)).unwrap());
        assert_eq!(clock.now_millis(), 30);
        assert_eq!(conn.get_ref().remaining(), 8);

        let mut buf = [0u8; 8];
        let len = conn.receive_data(&mut buf, ms(100)).unwrap();
        assert_eq!(&buf[..len], b"A");
    }

    #[test]
    fn wait_until_available_times_out() {
        let (clock, mut conn) = connection();
        assert!(!conn.wait_until_available(ms(200)).unwrap());
        assert_eq!(clock.now_millis(), 200);

        assert!(!conn.wait_until_available_default().unwrap());
        assert_eq!(clock.now_millis(), 1200);
    }

    #[test]
    fn flush_input_discards_ready_bytes_only() {
        let (clock, mut conn) = connection();
        conn.get_mut().push(b"stale,1\n").push_after(10, b"A,22757\n");

        assert_eq!(conn.flush_input().unwrap(), 8);
        clock.advance(10);

        let mut buf = [0u8; 8];
        let len = conn.receive_data(&mut buf, ms(100)).unwrap();
        assert_eq!(&buf[..len], b"A");
    }

    #[test]
    fn receive_works_across_clock_wraparound() {
        let clock = SimClock::starting_at(u32::MAX - 50);
        let mut stream = ScriptedStream::new(clock.clone());
        stream.push(b"bad,1\n").push_after(100, b"A,22757\n");
        let mut conn = Connection::with_config(stream, clock.clone(), LinkConfig::default());

        let mut buf = [0u8; 8];
        let len = conn.receive_data(&mut buf, ms(500)).unwrap();
        assert_eq!(&buf[..len], b"A");
        assert_eq!(clock.now_millis(), 49);
    }

    #[test]
    fn transport_failure_aborts_receive() {
        struct Unplugged;

        impl ByteStream for Unplugged {
            fn read_byte(&mut self) -> crcline_transport::Result<Option<u8>> {
                Err(TransportError::Closed)
            }

            fn peek_byte(&mut self) -> crcline_transport::Result<Option<u8>> {
                Err(TransportError::Closed)
            }

            fn bytes_available(&mut self) -> crcline_transport::Result<bool> {
                Err(TransportError::Closed)
            }

            fn write_all(&mut self, _bytes: &[u8]) -> crcline_transport::Result<()> {
                Err(TransportError::Closed)
            }
        }

        let mut conn = Connection::with_config(Unplugged, SimClock::new(), LinkConfig::default());
        let mut buf = [0u8; 8];
        assert!(matches!(
            conn.receive_data(&mut buf, ms(100)),
            Err(LinkError::Transport(TransportError::Closed))
        ));
        assert!(matches!(
            conn.wait_until_available(ms(100)),
            Err(LinkError::Transport(TransportError::Closed))
        ));
        assert!(matches!(
            conn.send_data(b"x"),
            Err(LinkError::Transport(TransportError::Closed))
        ));
    }
}
