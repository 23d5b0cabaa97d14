//! Deadline-bounded line assembly.
//!
//! The reader is a four-state machine driven one event at a time:
//!
//! ```text
//!                 byte (stored or dropped)
//!               +---------------------+
//!               v                     |
//!   start -> Accumulating ------------+
//!               |  \  LF after content
//!   CR after    |   +--------------------------> Done
//!   content     v                                 ^
//!           CrPending --- LF / other byte peeked / grace elapsed
//!
//!   Accumulating | CrPending --- deadline ---> TimedOut
//! ```
//!
//! CR, LF and CR LF all end a line exactly once. A CR arms a short grace
//! window; an LF arriving within it is consumed as part of the same line
//! ending. Blank lines are skipped.

use crcline_transport::{ByteStream, Clock, Deadline};
use tracing::{debug, trace};

use crate::codec::{FrameConfig, OverflowPolicy};
use crate::error::{FrameError, Result};

/// Where the reader is in assembling one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Accumulating,
    /// A CR ended the content; waiting briefly for a paired LF.
    CrPending { grace: Deadline },
    Done,
    TimedOut,
}

impl LineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LineState::Done | LineState::TimedOut)
    }
}

/// Input to [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// A byte was consumed from the stream.
    Byte(u8),
    /// The byte following a CR, peeked and left in the stream.
    Lookahead(u8),
    /// The CR grace window closed.
    GraceElapsed,
    /// The overall deadline passed.
    DeadlineExpired,
}

/// What the driver does with the buffer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Append the byte to the line.
    Store(u8),
    /// The buffer is full; the byte is discarded.
    Drop(u8),
}

/// Inputs to a transition besides the state and event.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// Bytes stored so far.
    pub len: usize,
    /// Bytes discarded so far because the buffer was full.
    pub dropped: usize,
    /// Bytes the buffer can store.
    pub room: usize,
    pub now: u32,
    pub grace_ms: u32,
}

impl Step {
    /// True once the line has any content, stored or not.
    fn has_content(&self) -> bool {
        self.len > 0 || self.dropped > 0
    }
}

/// Pure transition function of the line state machine.
pub fn transition(state: LineState, event: LineEvent, step: Step) -> (LineState, Effect) {
    if state.is_terminal() {
        return (state, Effect::None);
    }

    match (state, event) {
        (_, LineEvent::DeadlineExpired) => (LineState::TimedOut, Effect::None),
        (LineState::CrPending { .. }, LineEvent::GraceElapsed) => (LineState::Done, Effect::None),
        (LineState::CrPending { .. }, LineEvent::Lookahead(b)) if b != b'\n' => {
            (LineState::Done, Effect::None)
        }
        (_, LineEvent::Byte(b'\r')) if step.has_content() => (
            LineState::CrPending {
                grace: Deadline::after(step.now, step.grace_ms),
            },
            Effect::None,
        ),
        (_, LineEvent::Byte(b'\n')) if step.has_content() => (LineState::Done, Effect::None),
        (_, LineEvent::Byte(b'\r' | b'\n')) => (LineState::Accumulating, Effect::None),
        (_, LineEvent::Byte(b)) if step.len < step.room => (LineState::Accumulating, Effect::Store(b)),
        (_, LineEvent::Byte(b)) => (LineState::Accumulating, Effect::Drop(b)),
        (state, _) => (state, Effect::None),
    }
}

/// Reads one non-empty line from a [`ByteStream`] into a caller buffer.
#[derive(Debug, Clone)]
pub struct LineReader {
    grace_ms: u32,
    overflow: OverflowPolicy,
}

impl LineReader {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            grace_ms: u32::try_from(config.grace.as_millis()).unwrap_or(u32::MAX),
            overflow: config.overflow,
        }
    }

    /// Read one line into `buf`, returning its length.
    ///
    /// At most `buf.len() - 1` content bytes are stored and a `0` byte is
    /// written right after them. The line terminator is not stored. Returns
    /// [`FrameError::Timeout`] if no line ends before `deadline`; partial
    /// content is then meaningless.
    pub fn read_line<S, C>(
        &self,
        stream: &mut S,
        clock: &C,
        buf: &mut [u8],
        deadline: Deadline,
    ) -> Result<usize>
    where
        S: ByteStream + ?Sized,
        C: Clock + ?Sized,
    {
        if buf.is_empty() {
            return Err(FrameError::BufferTooSmall);
        }

        let room = buf.len() - 1;
        let mut state = LineState::Accumulating;
        let mut len = 0usize;
        let mut dropped = 0usize;

        loop {
            let now = clock.now_millis();
            let event = if deadline.is_expired(now) {
                Some(LineEvent::DeadlineExpired)
            } else {
                next_event(state, stream, now)?
            };

            let Some(event) = event else {
                clock.relax();
                continue;
            };

            let step = Step {
                len,
                dropped,
                room,
                now,
                grace_ms: self.grace_ms,
            };
            let (next, effect) = transition(state, event, step);
            match effect {
                Effect::Store(b) => {
                    buf[len] = b;
                    len += 1;
                }
                Effect::Drop(_) => dropped += 1,
                Effect::None => {}
            }
            if std::mem::discriminant(&next) != std::mem::discriminant(&state) {
                trace!(from = ?state, to = ?next, len, "line state");
            }
            state = next;

            match state {
                LineState::Done => break,
                LineState::TimedOut => {
                    debug!(len, "read_line timed out");
                    return Err(FrameError::Timeout);
                }
                _ => {}
            }
        }

        buf[len] = 0;

        if dropped > 0 {
            match self.overflow {
                OverflowPolicy::Reject => {
                    debug!(dropped, capacity = buf.len(), "line rejected: overflow");
                    return Err(FrameError::Overflow {
                        capacity: buf.len(),
                    });
                }
                OverflowPolicy::Truncate => {
                    debug!(dropped, capacity = buf.len(), "line truncated to buffer");
                }
            }
        }

        Ok(len)
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(&FrameConfig::default())
    }
}

/// Poll the stream for the next event, `None` when nothing is ready.
fn next_event<S>(state: LineState, stream: &mut S, now: u32) -> Result<Option<LineEvent>>
where
    S: ByteStream + ?Sized,
{
    if let LineState::CrPending { grace } = state {
        if grace.is_expired(now) {
            return Ok(Some(LineEvent::GraceElapsed));
        }
        return match stream.peek_byte()? {
            Some(b'\n') => Ok(stream.read_byte()?.map(LineEvent::Byte)),
            Some(b) => Ok(Some(LineEvent::Lookahead(b))),
            None => Ok(None),
        };
    }
    Ok(stream.read_byte()?.map(LineEvent::Byte))
}
