use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::checksum::Crc16;
use crate::error::{FrameError, Result};

/// Separates the payload from its checksum.
pub const DELIMITER: u8 = b',';

/// Default output terminator.
pub const DEFAULT_EOL: u8 = b'\n';

/// How long a CR waits for a paired LF.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(50);

/// The checksum carried by every frame.
pub const PROTOCOL_CRC: Crc16 = Crc16::Xmodem;

/// What the line reader does with a line longer than the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep the first `capacity - 1` bytes and accept the line.
    #[default]
    Truncate,
    /// Finish reading the line, then report [`FrameError::Overflow`].
    Reject,
}

/// A parsed line: payload plus the checksum it claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub payload: &'a [u8],
    pub checksum: u16,
}

/// Split `line` at its last comma and parse the decimal checksum after it.
///
/// Earlier commas belong to the payload. The checksum is the run of ASCII
/// digits directly after the comma; anything following that run is ignored.
/// Values above 65535 are reduced modulo 2^16, the way a 16-bit register
/// receives them.
pub fn decode(line: &[u8]) -> Result<Decoded<'_>> {
    let comma = line
        .iter()
        .rposition(|&b| b == DELIMITER)
        .ok_or(FrameError::Malformed)?;
    let suffix = &line[comma + 1..];

    let digits = suffix.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(FrameError::Malformed);
    }

    let checksum = suffix[..digits].iter().fold(0u16, |acc, &d| {
        acc.wrapping_mul(10).wrapping_add(u16::from(d - b'0'))
    });

    Ok(Decoded {
        payload: &line[..comma],
        checksum,
    })
}

/// Decode `line` and check its payload against the carried checksum.
///
/// Returns the payload with the checksum suffix removed.
pub fn verify(line: &[u8]) -> Result<&[u8]> {
    let decoded = decode(line)?;
    let actual = PROTOCOL_CRC.compute(decoded.payload);
    if actual != decoded.checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: decoded.checksum,
            actual,
        });
    }
    Ok(decoded.payload)
}

/// Remove `prefix` from the front of `payload`.
pub fn strip_prefix<'a>(payload: &'a [u8], prefix: &[u8]) -> Result<&'a [u8]> {
    payload
        .strip_prefix(prefix)
        .ok_or(FrameError::PrefixMismatch)
}

/// Append `payload,<crc>` and `eol` to `dst`.
///
/// Wire format:
/// ```text
/// <payload bytes>,<CRC16-XMODEM of payload, decimal><eol>
/// ```
pub fn encode_frame(payload: &[u8], eol: u8, dst: &mut BytesMut) -> Result<()> {
    if payload.iter().any(|&b| b == b'\r' || b == b'\n') {
        return Err(FrameError::EmbeddedTerminator);
    }

    let checksum = PROTOCOL_CRC.compute(payload).to_string();
    dst.reserve(payload.len() + checksum.len() + 2);
    dst.put_slice(payload);
    dst.put_u8(DELIMITER);
    dst.put_slice(checksum.as_bytes());
    dst.put_u8(eol);
    Ok(())
}

/// Bytes on the wire for `payload`, terminator included.
pub fn wire_size(payload: &[u8]) -> usize {
    let checksum = PROTOCOL_CRC.compute(payload);
    let digits = checksum.checked_ilog10().unwrap_or(0) as usize + 1;
    payload.len() + 1 + digits + 1
}

/// Configuration shared by the line reader and the frame writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Terminator appended to outgoing frames. Default: LF.
    pub eol: u8,
    /// Wait after a CR for a paired LF. Default: 50 ms.
    pub grace: Duration,
    /// Handling of lines longer than the receive buffer. Default: truncate.
    pub overflow: OverflowPolicy,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            eol: DEFAULT_EOL,
            grace: DEFAULT_GRACE,
            overflow: OverflowPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_comma_delimits_checksum() {
        let decoded = decode(b"a,b,12345").unwrap();
        assert_eq!(decoded.payload, b"a,b");
        assert_eq!(decoded.checksum, 12345);
    }

    #[test]
    fn line_without_comma_is_malformed() {
        assert!(matches!(decode(b"noComma"), Err(FrameError::Malformed)));
    }

    #[test]
    fn suffix_without_leading_digit_is_malformed() {
        assert!(matches!(decode(b"a,12,x"), Err(FrameError::Malformed)));
        assert!(matches!(decode(b"a,"), Err(FrameError::Malformed)));
        assert!(matches!(decode(b"a,+12"), Err(FrameError::Malformed)));
        assert!(matches!(decode(b"a, 12"), Err(FrameError::Malformed)));
    }

    #[test]
    fn text_after_checksum_digits_is_ignored() {
        let decoded = decode(b"a,12 ").unwrap();
        assert_eq!(decoded.payload, b"a");
        assert_eq!(decoded.checksum, 12);

        assert_eq!(verify(b"hello,50018 ").unwrap(), b"hello");
        assert_eq!(verify(b"hello,50018;v=2").unwrap(), b"hello");
    }

    #[test]
    fn checksum_above_u16_wraps() {
        assert_eq!(decode(b"a,65535").unwrap().checksum, 65535);
        assert_eq!(decode(b"a,65536").unwrap().checksum, 0);
        assert_eq!(verify(b"hello,115554").unwrap(), b"hello");
        assert_eq!(decode(b"a,0000012").unwrap().checksum, 12);
    }

    #[test]
    fn empty_payload_decodes() {
        let decoded = decode(b",0").unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.checksum, 0);
        assert_eq!(verify(b",0").unwrap(), b"");
    }

    #[test]
    fn verify_strips_valid_checksum() {
        assert_eq!(verify(b"hello,50018").unwrap(), b"hello");
        assert_eq!(verify(b"a,b,41780").unwrap(), b"a,b");
    }

    #[test]
    fn verify_rejects_wrong_checksum() {
        let err = verify(b"hello,50019").unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch {
                expected: 50019,
                actual: 50018
            }
        ));
    }

    #[test]
    fn encode_appends_checksum_and_terminator() {
        let mut buf = BytesMut::new();
        encode_frame(b"CMD=1", b'\n', &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"CMD=1,15478\n");

        buf.clear();
        encode_frame(b"AB", b'\r', &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"AB,22139\r");
    }

    #[test]
    fn encode_rejects_embedded_terminators() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(b"two\nlines", b'\n', &mut buf),
            Err(FrameError::EmbeddedTerminator)
        ));
        assert!(matches!(
            encode_frame(b"cr\r", b'\n', &mut buf),
            Err(FrameError::EmbeddedTerminator)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn encoded_frame_verifies_back_to_payload() {
        for payload in [&b""[..], b"A", b"STATUS=ok", b"temp=21.5;hum=40"] {
            let mut buf = BytesMut::new();
            encode_frame(payload, b'\n', &mut buf).unwrap();
            assert_eq!(buf.len(), wire_size(payload));
            let line = &buf[..buf.len() - 1];
            assert_eq!(verify(line).unwrap(), payload);
        }
    }

    #[test]
    fn prefix_is_stripped_or_rejected() {
        assert_eq!(strip_prefix(b"CMD=1", b"CMD").unwrap(), b"=1");
        assert_eq!(strip_prefix(b"CMD=1", b"").unwrap(), b"CMD=1");
        assert_eq!(strip_prefix(b"CMD", b"CMD").unwrap(), b"");
        assert!(matches!(
            strip_prefix(b"OTHER", b"CMD"),
            Err(FrameError::PrefixMismatch)
        ));
        assert!(matches!(
            strip_prefix(b"CM", b"CMD"),
            Err(FrameError::PrefixMismatch)
        ));
    }

    #[test]
    fn wire_size_counts_checksum_digits() {
        // crc("") = 0 -> one digit
        assert_eq!(wire_size(b""), 3);
        // crc("hello") = 50018 -> five digits
        assert_eq!(wire_size(b"hello"), 5 + 1 + 5 + 1);
    }
}
