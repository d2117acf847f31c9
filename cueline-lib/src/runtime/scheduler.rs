//! Deadline-ordered timers for the control thread.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::timer::SharedTime;

pub type TimerId = u64;

/// What a due timer should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ProgressTick,
    RetryAdvance,
}

/// Timer queue read by the runtime loop.
///
/// Nothing here sleeps. The runtime asks for the next deadline, waits on its
/// message queue until then, and pops whatever is due.
pub struct Scheduler {
    time: SharedTime,
    entries: BTreeMap<(Instant, TimerId), TimerKind>,
    next_id: TimerId,
}

impl Scheduler {
    pub fn new(time: SharedTime) -> Self {
        Self {
            time,
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn now(&self) -> Instant {
        self.time.now()
    }

    pub fn schedule_in(&mut self, delay: Duration, kind: TimerKind) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((self.time.now() + delay, id), kind);
        id
    }

    /// Remove a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.entries.keys().find(|(_, entry)| *entry == id).copied();
        match key {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.entries.keys().any(|(_, entry)| *entry == id)
    }

    /// Number of pending timers of `kind`.
    pub fn pending(&self, kind: TimerKind) -> usize {
        self.entries.values().filter(|k| **k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Time left until the earliest deadline, zero if it already passed.
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.time.now();
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return the earliest timer whose deadline has passed.
    pub fn pop_due(&mut self) -> Option<(TimerId, TimerKind)> {
        let now = self.time.now();
        let (&(deadline, id), &kind) = self.entries.iter().next()?;
        if deadline > now {
            return None;
        }
        self.entries.remove(&(deadline, id));
        Some((id, kind))
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.entries.len())
            .finish()
    }
}
