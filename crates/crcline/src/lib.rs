//! CRC16-checksummed line protocol for UARTs and other unreliable byte streams.
//!
//! Each message is one ASCII line: `payload,<crc16-xmodem decimal><eol>`.
//! Receivers accept CR, LF or CR LF endings, validate the checksum, and keep
//! reading until a valid line arrives or their deadline passes.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte stream and clock abstractions (serial ports behind `serial`)
//! - [`frame`]: CRC16, line codec and the deadline-bounded line reader
//! - [`link`]: retrying connection with prefix filtering (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use crcline_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use crcline_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use crcline_link::*;
}
