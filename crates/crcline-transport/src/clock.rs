use std::time::Instant;

/// A monotonic millisecond counter.
///
/// The counter is allowed to wrap around `u32::MAX`; all comparisons go
/// through [`Deadline`], which compares by wrapping subtraction.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_millis(&self) -> u32;

    /// Called once per idle poll iteration while waiting for input.
    fn relax(&self) {
        std::hint::spin_loop();
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u32 {
        (**self).now_millis()
    }

    fn relax(&self) {
        (**self).relax()
    }
}

/// Wall-clock backed [`Clock`] measured from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u32 {
        // Truncation is the wraparound.
        self.origin.elapsed().as_millis() as u32
    }

    fn relax(&self) {
        std::thread::yield_now();
    }
}

/// An absolute point on a wrapping millisecond timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: u32,
}

impl Deadline {
    /// Deadline `millis` milliseconds after `now`.
    pub fn after(now: u32, millis: u32) -> Self {
        Self {
            at: now.wrapping_add(millis),
        }
    }

    /// Deadline `millis` milliseconds from the clock's current time.
    pub fn from_clock<C: Clock + ?Sized>(clock: &C, millis: u32) -> Self {
        Self::after(clock.now_millis(), millis)
    }

    /// True once `now` has reached or passed the deadline.
    ///
    /// Valid as long as the deadline is less than 2^31 ms away from `now`.
    pub fn is_expired(&self, now: u32) -> bool {
        (now.wrapping_sub(self.at) as i32) >= 0
    }

    /// Milliseconds left before expiry, zero once expired.
    pub fn remaining(&self, now: u32) -> u32 {
        if self.is_expired(now) {
            0
        } else {
            self.at.wrapping_sub(now)
        }
    }

    pub fn at(&self) -> u32 {
        self.at
    }
}
