//! Session time read from the tokio timer.
//!
//! The runner schedules everything with tokio intervals, so session
//! timestamps come from the same source. Under a paused test runtime both
//! advance together.

use sunny_core::{Clock, Timestamp};
use tokio::time::Instant;

/// Milliseconds since the clock was created, on tokio's timeline.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Start counting from now.
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        Timestamp(u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX))
    }
}
