//! CRC16-checksummed ASCII line framing.
//!
//! Every frame on the wire is one line:
//! - the payload (ASCII, no CR or LF)
//! - a comma
//! - the CRC16-XMODEM of the payload as an unsigned decimal number
//! - a terminator (one configurable byte on output; CR, LF or CR LF on input)
//!
//! [`LineReader`] assembles lines from a [`crcline_transport::ByteStream`]
//! under a deadline, [`codec`] validates and strips the checksum, and
//! [`FrameWriter`] produces frames.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use checksum::{crc16_ccitt, crc16_xmodem, Crc16};
pub use codec::{
    decode, encode_frame, strip_prefix, verify, wire_size, Decoded, FrameConfig, OverflowPolicy,
    DEFAULT_EOL, DEFAULT_GRACE, DELIMITER, PROTOCOL_CRC,
};
pub use error::{FrameError, Result};
pub use reader::{transition, Effect, LineEvent, LineReader, LineState, Step};
pub use writer::FrameWriter;
