//! Deterministic stand-ins for a UART and a millisecond timer.
//!
//! [`SimClock`] only moves when told to, or by one millisecond per idle
//! poll (`relax`), so every wait in the layers above finishes in a bounded
//! number of iterations without touching the wall clock. [`ScriptedStream`]
//! releases bytes at scripted instants of a shared [`SimClock`].

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::clock::{Clock, Deadline};
use crate::error::Result;
use crate::traits::ByteStream;

/// A manually driven [`Clock`]. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start the counter at `millis`, e.g. just below `u32::MAX` to test wraparound.
    pub fn starting_at(millis: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(millis)),
        }
    }

    pub fn advance(&self, millis: u32) {
        self.now.set(self.now.get().wrapping_add(millis));
    }

    pub fn set(&self, millis: u32) {
        self.now.set(millis);
    }
}

impl Clock for SimClock {
    fn now_millis(&self) -> u32 {
        self.now.get()
    }

    fn relax(&self) {
        self.advance(1);
    }
}

/// An in-memory [`ByteStream`] fed from a timed script.
#[derive(Debug)]
pub struct ScriptedStream {
    clock: SimClock,
    script: VecDeque<(Deadline, u8)>,
    written: Vec<u8>,
}

impl ScriptedStream {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            script: VecDeque::new(),
            written: Vec::new(),
        }
    }

    /// Make `bytes` readable immediately (after anything queued before them).
    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        self.push_after(0, bytes)
    }

    /// Make `bytes` readable `delay` ms from the clock's current time.
    ///
    /// The stream stays FIFO: bytes never overtake earlier entries.
    pub fn push_after(&mut self, delay: u32, bytes: &[u8]) -> &mut Self {
        let release = Deadline::from_clock(&self.clock, delay);
        self.script.extend(bytes.iter().map(|&b| (release, b)));
        self
    }

    /// Everything written to the stream so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }

    /// Bytes still queued, released or not.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn ready(&self) -> Option<u8> {
        let now = self.clock.now_millis();
        self.script
            .front()
            .filter(|(release, _)| release.is_expired(now))
            .map(|&(_, b)| b)
    }
}

impl ByteStream for ScriptedStream {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.ready();
        if byte.is_some() {
            self.script.pop_front();
        }
        Ok(byte)
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.ready())
    }

    fn bytes_available(&mut self) -> Result<bool> {
        Ok(self.ready().is_some())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }
}
