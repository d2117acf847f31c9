//! Auto-advance on natural end of track, with bounded retries.
//!
//! When the engine reports `TrackEnded` the controller moves the playlist
//! cursor forward and tries to start the next entry. A failed start opens a
//! [`RetrySession`]; each further attempt is a scheduler entry rather than a
//! sleep, so any manual navigation can cancel it before it fires.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{PlayerError, Result};
use crate::playback::{EventHub, PlaybackEngine, PlayerEvent, Track};
use crate::runtime::scheduler::{Scheduler, TimerId, TimerKind};

use super::{Playlist, TrackRef};

/// Default pause before re-attempting an advance.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Default number of start attempts per advance.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceState {
    Idle,
    Advancing,
    RetryPending,
    GivenUp,
}

/// Bookkeeping for one track that failed to start.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySession {
    pub target: Track,
    pub index: usize,
    pub attempt: u32,
    pub max_attempts: u32,
    /// A retry timer is armed.
    pub pending: bool,
    timer: Option<TimerId>,
}

pub struct AutoAdvanceController {
    playlist: Playlist,
    session: Option<RetrySession>,
    state: AdvanceState,
    enabled: bool,
    retry_delay: Duration,
    max_attempts: u32,
    events: EventHub,
}

impl AutoAdvanceController {
    pub fn new(events: EventHub) -> Self {
        Self {
            playlist: Playlist::default(),
            session: None,
            state: AdvanceState::Idle,
            enabled: true,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            events,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Attempts per advance, at least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn state(&self) -> AdvanceState {
        self.state
    }

    pub fn session(&self) -> Option<&RetrySession> {
        self.session.as_ref()
    }

    pub fn auto_advance(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn set_auto_advance(&mut self, enabled: bool, scheduler: &mut Scheduler) {
        self.enabled = enabled;
        if !enabled {
            self.cancel_retry(scheduler);
        }
    }

    /// Replace the playlist without starting playback.
    pub fn set_playlist(&mut self, tracks: Vec<TrackRef>, scheduler: &mut Scheduler) {
        self.cancel_retry(scheduler);
        self.playlist.replace(tracks);
    }

    /// Drop any retry session and remove its timer.
    pub fn cancel_retry(&mut self, scheduler: &mut Scheduler) {
        if let Some(session) = self.session.take() {
            if let Some(timer) = session.timer {
                scheduler.cancel(timer);
            }
            debug!(
                "cancelled retry of {} after {} attempt(s)",
                session.target.path, session.attempt
            );
        }
        self.state = AdvanceState::Idle;
    }

    /// Detach the playlist from playback for a track loaded by path.
    ///
    /// Cancels any retry and clears the cursor, so the loaded track ending
    /// does not advance into the playlist.
    pub fn release_cursor(&mut self, scheduler: &mut Scheduler) {
        self.cancel_retry(scheduler);
        if self.playlist.set_current(None).is_ok() {
            debug!("playlist cursor cleared");
        }
    }

    /// React to a natural end of track.
    ///
    /// A track that was not started from the playlist ends the playlist.
    pub fn on_track_ended(&mut self, engine: &mut PlaybackEngine, scheduler: &mut Scheduler) {
        self.cancel_retry(scheduler);
        let next = match self.playlist.current_index() {
            Some(_) if self.enabled => self.playlist.next_index(),
            _ => None,
        };

        let Some(index) = next else {
            info!("playlist ended");
            self.events.emit(PlayerEvent::PlaylistEnded);
            return;
        };
        if self.playlist.set_current(Some(index)).is_ok() {
            self.attempt(index, engine, scheduler);
        }
    }

    /// Run the retry for a fired timer. Timers that no longer belong to the
    /// active session are ignored.
    pub fn on_retry_timer(
        &mut self,
        timer: TimerId,
        engine: &mut PlaybackEngine,
        scheduler: &mut Scheduler,
    ) {
        let index = match self.session.as_mut() {
            Some(session) if session.timer == Some(timer) => {
                session.timer = None;
                session.pending = false;
                session.index
            }
            _ => {
                debug!("ignoring stale retry timer {}", timer);
                return;
            }
        };
        self.attempt(index, engine, scheduler);
    }

    fn attempt(&mut self, index: usize, engine: &mut PlaybackEngine, scheduler: &mut Scheduler) {
        let Some(entry) = self.playlist.get(index).cloned() else {
            self.cancel_retry(scheduler);
            return;
        };
        self.state = AdvanceState::Advancing;

        let started = engine
            .load(&entry.path, Some(0.0))
            .and_then(|track| engine.play().map(|()| track));

        match started {
            Ok(track) => {
                info!("advanced to {}", track.path);
                self.session = None;
                self.state = AdvanceState::Idle;
                self.events.emit(PlayerEvent::Advanced(track));
            }
            Err(err) => self.record_failure(index, &entry, err, engine, scheduler),
        }
    }

    fn record_failure(
        &mut self,
        index: usize,
        entry: &TrackRef,
        err: PlayerError,
        engine: &mut PlaybackEngine,
        scheduler: &mut Scheduler,
    ) {
        let max_attempts = self.max_attempts;
        let session = match self.session.take() {
            Some(session) if session.index == index => session,
            _ => RetrySession {
                target: Track::new(entry.path.clone()),
                index,
                attempt: 0,
                max_attempts,
                pending: false,
                timer: None,
            },
        };
        let mut session = session;
        session.attempt += 1;
        self.state = AdvanceState::RetryPending;
        warn!(
            "advance to {} failed (attempt {}/{}): {}",
            entry.path, session.attempt, session.max_attempts, err
        );
        self.events.emit(PlayerEvent::RetryAttempted {
            track: session.target.clone(),
            attempt: session.attempt,
            max: session.max_attempts,
        });

        if session.attempt >= session.max_attempts {
            self.state = AdvanceState::GivenUp;
            error!(
                "giving up on {} after {} attempts",
                entry.path, session.attempt
            );
            self.events.emit(PlayerEvent::PlaybackFailed(session.target.clone()));
            engine.stop(true);
            self.state = AdvanceState::Idle;
            return;
        }

        session.timer = Some(scheduler.schedule_in(self.retry_delay, TimerKind::RetryAdvance));
        session.pending = true;
        self.session = Some(session);
    }

    /// Load and play the entry at `index`. Failures are not retried.
    pub fn select(
        &mut self,
        index: usize,
        engine: &mut PlaybackEngine,
        scheduler: &mut Scheduler,
    ) -> Result<Track> {
        self.cancel_retry(scheduler);
        let entry = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(PlayerError::IndexOutOfBounds(index))?;
        self.playlist.set_current(Some(index))?;
        let track = engine.load(&entry.path, Some(0.0))?;
        engine.play()?;
        Ok(track)
    }

    /// Select the entry after the cursor. `Ok(None)` past the end.
    pub fn next(
        &mut self,
        engine: &mut PlaybackEngine,
        scheduler: &mut Scheduler,
    ) -> Result<Option<Track>> {
        self.cancel_retry(scheduler);
        match self.playlist.next_index() {
            Some(index) => self.select(index, engine, scheduler).map(Some),
            None => {
                debug!("next ignored: at end of playlist");
                Ok(None)
            }
        }
    }

    pub fn previous(
        &mut self,
        engine: &mut PlaybackEngine,
        scheduler: &mut Scheduler,
    ) -> Result<Option<Track>> {
        self.cancel_retry(scheduler);
        match self.playlist.previous_index() {
            Some(index) => self.select(index, engine, scheduler).map(Some),
            None => {
                debug!("previous ignored: at start of playlist");
                Ok(None)
            }
        }
    }
}
