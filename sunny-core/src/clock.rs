//! Time sources for the cognition layer.
//!
//! Nothing in the core reads the wall clock directly. Components take an
//! `Arc<dyn Clock>` so tests can drive time with a [`ManualClock`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::Timestamp;

/// A monotonic-enough source of session timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time on the session timeline.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time measured from the moment the clock was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: DateTime<Utc>,
}

impl SystemClock {
    /// Start a clock whose origin is "now".
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Utc::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = Utc::now() - self.origin;
        Timestamp(u64::try_from(elapsed.num_milliseconds()).unwrap_or(0))
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start.0)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.now_ms.store(to.0, Ordering::SeqCst);
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let ms = u64::try_from(delta.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ms.load(Ordering::SeqCst))
    }
}
