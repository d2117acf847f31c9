//! Time sources and a pausable stopwatch.
//!
//! Everything in the crate that needs "now" reads it through a [`TimeSource`]
//! so the control loop, the scheduler and the in-memory backend can all be
//! driven by a [`ManualClock`] in tests.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Shared handle to a time source.
pub type SharedTime = Arc<dyn TimeSource>;

/// Wall-clock time source backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced time source.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pausable stopwatch measuring elapsed time on a [`TimeSource`].
#[derive(Clone)]
pub struct Stopwatch {
    time: SharedTime,
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl Stopwatch {
    pub fn new(time: SharedTime) -> Self {
        Self {
            time,
            accumulated: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(self.time.now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(start) = self.started_at.take() {
            self.accumulated += self.time.now().saturating_duration_since(start);
        }
    }

    /// Reset to `elapsed`, keeping the running/paused state.
    pub fn set(&mut self, elapsed: Duration) {
        self.accumulated = elapsed;
        if self.started_at.is_some() {
            self.started_at = Some(self.time.now());
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(start) => self.accumulated + self.time.now().saturating_duration_since(start),
            None => self.accumulated,
        }
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }
}

impl std::fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stopwatch")
            .field("elapsed", &self.elapsed())
            .field("running", &self.is_running())
            .finish()
    }
}
