//! Byte stream and clock abstractions for line-oriented serial links.
//!
//! Everything above this layer talks to the outside world through two small
//! capabilities:
//! - [`ByteStream`]: poll-style single byte reads, one byte of lookahead, writes
//! - [`Clock`]: a wrapping millisecond counter used for every deadline
//!
//! Concrete adapters wrap any `Read + Write` handle ([`IoStream`]), Unix
//! sockets, and (behind the `serial` feature) UART devices. The [`sim`]
//! module provides a manually driven clock and a scripted stream for tests.

pub mod clock;
pub mod error;
pub mod sim;
pub mod traits;

#[cfg(feature = "serial")]
pub mod serial;

pub use clock::{Clock, Deadline, SystemClock};
pub use error::{Result, TransportError};
pub use traits::{ByteStream, IoStream, DEFAULT_WRITE_TIMEOUT};

#[cfg(feature = "serial")]
pub use serial::{list_ports, open_serial, SerialStream};
