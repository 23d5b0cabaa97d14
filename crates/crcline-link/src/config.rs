use std::time::Duration;

use crcline_frame::{FrameConfig, OverflowPolicy, DEFAULT_EOL, DEFAULT_GRACE};

/// Default per-call receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Connection-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Terminator appended to outgoing frames. Default: LF.
    pub eol: u8,
    /// Timeout used by the `*_default` receive helpers. Default: 1 s.
    pub default_timeout: Duration,
    /// Wait after a CR for a paired LF. Default: 50 ms.
    pub grace: Duration,
    /// Handling of lines longer than the receive buffer. Default: truncate.
    pub overflow: OverflowPolicy,
}

impl LinkConfig {
    /// The framing layer's view of this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            eol: self.eol,
            grace: self.grace,
            overflow: self.overflow,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            eol: DEFAULT_EOL,
            default_timeout: DEFAULT_TIMEOUT,
            grace: DEFAULT_GRACE,
            overflow: OverflowPolicy::Truncate,
        }
    }
}
