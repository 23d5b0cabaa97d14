//! Optional human-readable diagnostics.
//!
//! A connection can echo what it is doing to a [`DiagnosticSink`], e.g. a
//! debug console next to the data link. Writes are best-effort: a failing
//! sink never affects the protocol.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Destination for diagnostic text.
///
/// Sinks travel with their connection, so they must be `Send`.
pub trait DiagnosticSink: Send {
    fn write_text(&mut self, text: &str);
}

/// Number base for integer diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    Bin,
    Oct,
    #[default]
    Dec,
    Hex,
}

/// A value that can be written to a diagnostic sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagValue<'a> {
    Text(&'a str),
    Signed(i64),
    Unsigned(u64),
}

impl DiagValue<'_> {
    /// Render the value; the radix only applies to integers.
    ///
    /// Negative numbers in a non-decimal radix are shown in two's complement.
    pub fn render(&self, radix: Radix) -> String {
        match *self {
            DiagValue::Text(text) => text.to_string(),
            DiagValue::Signed(n) => match radix {
                Radix::Bin => format!("{n:b}"),
                Radix::Oct => format!("{n:o}"),
                Radix::Dec => n.to_string(),
                Radix::Hex => format!("{n:X}"),
            },
            DiagValue::Unsigned(n) => match radix {
                Radix::Bin => format!("{n:b}"),
                Radix::Oct => format!("{n:o}"),
                Radix::Dec => n.to_string(),
                Radix::Hex => format!("{n:X}"),
            },
        }
    }
}

impl<'a> From<&'a str> for DiagValue<'a> {
    fn from(text: &'a str) -> Self {
        DiagValue::Text(text)
    }
}

impl From<i64> for DiagValue<'_> {
    fn from(n: i64) -> Self {
        DiagValue::Signed(n)
    }
}

impl From<i32> for DiagValue<'_> {
    fn from(n: i32) -> Self {
        DiagValue::Signed(n.into())
    }
}

impl From<u64> for DiagValue<'_> {
    fn from(n: u64) -> Self {
        DiagValue::Unsigned(n)
    }
}

impl From<u32> for DiagValue<'_> {
    fn from(n: u32) -> Self {
        DiagValue::Unsigned(n.into())
    }
}

impl From<u16> for DiagValue<'_> {
    fn from(n: u16) -> Self {
        DiagValue::Unsigned(n.into())
    }
}

/// An optional sink plus the print helpers a connection uses.
#[derive(Default)]
pub struct Diagnostics {
    sink: Option<Box<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn clear_sink(&mut self) {
        self.sink = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn print<'a>(&mut self, value: impl Into<DiagValue<'a>>) {
        self.print_radix(value, Radix::Dec);
    }

    pub fn println<'a>(&mut self, value: impl Into<DiagValue<'a>>) {
        self.println_radix(value, Radix::Dec);
    }

    pub fn print_radix<'a>(&mut self, value: impl Into<DiagValue<'a>>, radix: Radix) {
        if let Some(sink) = self.sink.as_mut() {
            sink.write_text(&value.into().render(radix));
        }
    }

    pub fn println_radix<'a>(&mut self, value: impl Into<DiagValue<'a>>, radix: Radix) {
        if let Some(sink) = self.sink.as_mut() {
            let mut line = value.into().render(radix);
            line.push_str("\r\n");
            sink.write_text(&line);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Writes diagnostics to any `std::io::Write`, ignoring write errors.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> DiagnosticSink for WriteSink<W> {
    fn write_text(&mut self, text: &str) {
        let _ = self.inner.write_all(text.as_bytes());
        let _ = self.inner.flush();
    }
}

/// Forwards completed diagnostic lines to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingSink {
    pending: String,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for TracingSink {
    fn write_text(&mut self, text: &str) {
        self.pending.push_str(text);
        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            debug!(target: "crcline::diag", "{}", line.trim_end());
        }
    }
}

/// Keeps diagnostics in memory; clones share the same text.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    text: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        match self.text.lock() {
            Ok(text) => text.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn write_text(&mut self, text: &str) {
        if let Ok(mut buf) = self.text.lock() {
            buf.push_str(text);
        }
    }
}
