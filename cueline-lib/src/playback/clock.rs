//! Periodic position sampling for UI updates.

use std::time::Duration;

use super::engine::PlaybackEngine;
use super::events::{EventHub, PlayerEvent};

/// Default sampling interval.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
/// Default drift (seconds) that forces a re-sync after a drag.
pub const DEFAULT_RESYNC_THRESHOLD: f64 = 0.1;

/// Turns engine position into `PositionChanged` events.
///
/// The clock does not own a timer; the runtime calls [`ProgressClock::tick`]
/// every [`ProgressClock::interval`] while the engine is playing. Ticks are
/// suspended while a seek drag is active.
#[derive(Debug)]
pub struct ProgressClock {
    interval: Duration,
    resync_threshold: f64,
    events: EventHub,
    dragging: bool,
    displayed: Option<f64>,
    last_sample: Option<f64>,
}

impl ProgressClock {
    pub fn new(interval: Duration, resync_threshold: f64, events: EventHub) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            resync_threshold: resync_threshold.max(0.0),
            events,
            dragging: false,
            displayed: None,
            last_sample: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample the engine once. Returns the emitted position, if any.
    pub fn tick(&mut self, engine: &PlaybackEngine) -> Option<f64> {
        if self.dragging || !engine.state().is_playing() {
            return None;
        }
        let position = engine.position();
        if self.last_sample == Some(position) {
            return None;
        }
        self.last_sample = Some(position);
        self.events.emit(PlayerEvent::PositionChanged(position));
        Some(position)
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
        self.displayed = self.last_sample;
    }

    /// Record the position the user is dragging over.
    pub fn drag_to(&mut self, position: f64) {
        if self.dragging {
            self.displayed = Some(position);
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Finish the drag and re-sync once with the engine.
    ///
    /// Emits only when the engine drifted at least the resync threshold away
    /// from the displayed value.
    pub fn end_drag(&mut self, engine: &PlaybackEngine) -> Option<f64> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        let displayed = self.displayed.take().unwrap_or(0.0);
        let actual = engine.position();

        if (actual - displayed).abs() >= self.resync_threshold {
            self.last_sample = Some(actual);
            self.events.emit(PlayerEvent::PositionChanged(actual));
            Some(actual)
        } else {
            self.last_sample = Some(displayed);
            None
        }
    }

    /// Forget the last sample and any drag in progress.
    pub fn reset(&mut self) {
        self.dragging = false;
        self.displayed = None;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemoryBackend, MemoryLibrary, SignalRouter};
    use crate::timer::ManualClock;
    use std::sync::Arc;

    fn playing_engine(clock: &ManualClock, hub: EventHub) -> PlaybackEngine {
        let library = MemoryLibrary::new();
        library.add_track("song.flac", 60.0);
        let backend = MemoryBackend::new(library, Arc::new(clock.clone()));
        let mut engine = PlaybackEngine::new(Box::new(backend), SignalRouter::discard(), hub);
        engine.load("song.flac", None).expect("load");
        engine.play().expect("play");
        engine
    }

    #[test]
    fn ticks_only_emit_changed_positions() {
        let clock = ManualClock::new();
        let hub = EventHub::new();
        let engine = playing_engine(&clock, hub.clone());
        let events = hub.subscribe();
        let mut progress = ProgressClock::new(DEFAULT_PROGRESS_INTERVAL, 0.1, hub);

        clock.advance(Duration::from_millis(100));
        assert!(progress.tick(&engine).is_some());
        assert_eq!(progress.tick(&engine), None);
        clock.advance(Duration::from_millis(100));
        assert!(progress.tick(&engine).is_some());
        assert_eq!(events.drain().len(), 2);
    }

    #[test]
    fn paused_engine_is_not_sampled() {
        let clock = ManualClock::new();
        let hub = EventHub::new();
        let mut engine = playing_engine(&clock, hub.clone());
        let mut progress = ProgressClock::new(DEFAULT_PROGRESS_INTERVAL, 0.1, hub);

        engine.pause();
        clock.advance(Duration::from_secs(1));
        assert_eq!(progress.tick(&engine), None);
    }

    #[test]
    fn drag_suspends_ticks_and_resyncs_on_drift() {
        let clock = ManualClock::new();
        let hub = EventHub::new();
        let engine = playing_engine(&clock, hub.clone());
        let mut progress = ProgressClock::new(DEFAULT_PROGRESS_INTERVAL, 0.1, hub);

        progress.begin_drag();
        progress.drag_to(30.0);
        clock.advance(Duration::from_millis(500));
        assert_eq!(progress.tick(&engine), None);

        let resynced = progress.end_drag(&engine).expect("drifted");
        assert!((resynced - 0.5).abs() < 1e-6);
        assert!(!progress.is_dragging());
    }

    #[test]
    fn small_drift_after_drag_is_not_reported() {
        let clock = ManualClock::new();
        let hub = EventHub::new();
        let mut engine = playing_engine(&clock, hub.clone());
        let mut progress = ProgressClock::new(DEFAULT_PROGRESS_INTERVAL, 0.1, hub);

        progress.begin_drag();
        progress.drag_to(20.0);
        engine.seek(20.0).expect("seek");
        clock.advance(Duration::from_millis(50));
        assert_eq!(progress.end_drag(&engine), None);
    }
}
