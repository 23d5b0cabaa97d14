//! Connection management for the CRC16 line protocol.
//!
//! A [`Connection`] owns one byte stream and offers fire-and-forget sends
//! and receives that keep reading lines until a valid one (optionally with
//! a given prefix) arrives or the deadline passes. Corrupt, malformed and
//! non-matching lines are skipped silently.

pub mod config;
pub mod connection;
pub mod diag;
pub mod error;

pub use config::{LinkConfig, DEFAULT_TIMEOUT};
pub use connection::Connection;
pub use diag::{DiagValue, DiagnosticSink, Diagnostics, MemorySink, Radix, TracingSink, WriteSink};
pub use error::{LinkError, Result};
