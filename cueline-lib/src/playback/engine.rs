//! Single-track transport state machine.
//!
//! The engine owns at most one [`AudioResource`]. Every open is stamped with a
//! fresh generation so completions that belong to a torn-down resource can be
//! recognised and dropped when they are finally delivered.

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::audio::{
    clamp_seek_target, AudioBackend, AudioResource, BackendSignal, Generation, OpenRequest,
    SignalRouter, DEFAULT_END_BUFFER,
};
use crate::error::{PlayerError, Result};

use super::events::{EventHub, PlayerEvent};
use super::state::{PlaybackState, StopReason, Track};
use super::volume::Volume;

pub struct PlaybackEngine {
    backend: Box<dyn AudioBackend>,
    router: SignalRouter,
    events: EventHub,
    end_buffer: f64,
    state: PlaybackState,
    resource: Option<Box<dyn AudioResource>>,
    track: Option<Track>,
    last_path: Option<String>,
    volume: Volume,
    generation: Generation,
    last_stop_reason: Option<StopReason>,
    ended_while_paused: bool,
}

impl PlaybackEngine {
    /// Create a stopped engine.
    ///
    /// # Arguments
    ///
    /// * `backend` - Factory for audio resources.
    /// * `router` - Where backend completion signals are posted.
    /// * `events` - Hub receiving every engine event.
    pub fn new(backend: Box<dyn AudioBackend>, router: SignalRouter, events: EventHub) -> Self {
        Self {
            backend,
            router,
            events,
            end_buffer: DEFAULT_END_BUFFER,
            state: PlaybackState::Stopped,
            resource: None,
            track: None,
            last_path: None,
            volume: Volume::default(),
            generation: 0,
            last_stop_reason: None,
            ended_while_paused: false,
        }
    }

    /// Override the seek end buffer (seconds) for subsequent loads and seeks.
    pub fn set_end_buffer(&mut self, seconds: f64) {
        self.end_buffer = seconds.max(0.0);
    }

    pub fn end_buffer(&self) -> f64 {
        self.end_buffer
    }

    /// Open `path`, tearing down whatever was loaded before.
    ///
    /// On success the engine is in [`PlaybackState::Loading`] with the
    /// resource paused at `start_position` (validated) or 0.
    pub fn load(&mut self, path: &str, start_position: Option<f64>) -> Result<Track> {
        if self.resource.is_some() {
            self.stop(true);
        }
        self.track = None;
        self.generation += 1;

        let request = OpenRequest {
            path: PathBuf::from(path),
            end_buffer: self.end_buffer,
            volume: self.volume.linear(),
            notifier: self.router.notifier(self.generation),
        };

        let mut resource = match self.backend.open(request) {
            Ok(resource) => resource,
            Err(err) => {
                let message = err.to_string();
                warn!("failed to load {}: {}", path, message);
                self.state = PlaybackState::Error(message.clone());
                self.last_stop_reason = Some(StopReason::Error);
                self.events.emit(PlayerEvent::ErrorOccurred(message));
                return Err(err.into());
            }
        };

        let duration = resource.total_duration();
        let mut position = 0.0;
        if let Some(offset) = start_position {
            let validated = clamp_seek_target(offset, duration, self.end_buffer);
            if validated > 0.0 {
                match resource.seek(validated) {
                    Ok(()) => position = validated,
                    Err(err) => warn!("start offset {:.3}s on {} ignored: {}", offset, path, err),
                }
            }
        }

        let track = Track {
            path: path.to_string(),
            duration_seconds: duration,
            position_seconds: position,
        };
        info!("loaded {} ({:.3}s)", path, duration);

        self.resource = Some(resource);
        self.track = Some(track.clone());
        self.last_path = Some(path.to_string());
        self.state = PlaybackState::Loading;

        self.events.emit(PlayerEvent::DurationChanged(duration));
        if start_position.is_some() {
            self.events.emit(PlayerEvent::PositionChanged(position));
        }
        Ok(track)
    }

    /// Start or resume playback.
    ///
    /// From `Stopped` with a remembered path the file is reloaded and played
    /// from the beginning. Resuming a track whose stream ran out while paused
    /// re-posts its completion, so the end is handled on the next signal pass.
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => {
                debug!("play ignored: already playing");
                return Ok(());
            }
            PlaybackState::Error(_) => {
                debug!("play ignored: engine is in error state");
                return Ok(());
            }
            PlaybackState::Stopped => {
                let Some(path) = self.last_path.clone() else {
                    debug!("play ignored: nothing loaded");
                    return Ok(());
                };
                self.load(&path, None)?;
            }
            PlaybackState::Loading | PlaybackState::Paused => {}
        }

        let resource = self
            .resource
            .as_mut()
            .ok_or_else(|| PlayerError::EngineFault("no resource to play".to_string()))?;
        resource.play();
        self.state = PlaybackState::Playing;
        self.events.emit(PlayerEvent::Started);
        if std::mem::take(&mut self.ended_while_paused) {
            self.router.notifier(self.generation).finished();
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.play()
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!("pause ignored in state {}", self.state);
            return;
        }
        let position = self.position();
        if let Some(resource) = self.resource.as_mut() {
            resource.pause();
        }
        if let Some(track) = self.track.as_mut() {
            track.position_seconds = position;
        }
        self.state = PlaybackState::Paused;
        self.events.emit(PlayerEvent::Paused);
    }

    /// Release the resource and return to `Stopped`.
    ///
    /// Emits `Stopped` and `PositionChanged(0)` unless `suppress_event` is
    /// set. Stopping an engine that is already stopped does nothing.
    pub fn stop(&mut self, suppress_event: bool) {
        if self.state == PlaybackState::Stopped && self.resource.is_none() {
            debug!("stop ignored: already stopped");
            return;
        }
        self.release();
        self.track = None;
        self.generation += 1;
        self.state = PlaybackState::Stopped;
        self.last_stop_reason = Some(StopReason::Manual);

        if !suppress_event {
            self.events.emit(PlayerEvent::Stopped);
            self.events.emit(PlayerEvent::PositionChanged(0.0));
        }
    }

    /// Move the playhead and return the validated position.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let end_buffer = self.end_buffer;
        let Some(resource) = self.resource.as_mut() else {
            debug!("seek ignored: no track loaded");
            return Ok(0.0);
        };

        let validated = clamp_seek_target(seconds, resource.total_duration(), end_buffer);
        if let Err(err) = resource.seek(validated) {
            warn!("seek to {:.3}s failed: {}", validated, err);
            self.events.emit(PlayerEvent::ErrorOccurred(err.to_string()));
            return Err(err.into());
        }

        if let Some(track) = self.track.as_mut() {
            track.position_seconds = validated;
        }
        self.events.emit(PlayerEvent::PositionChanged(validated));
        Ok(validated)
    }

    /// Set the volume in percent and return the clamped value.
    pub fn set_volume(&mut self, percent: f64) -> f64 {
        self.volume = Volume::new(percent);
        if let Some(resource) = self.resource.as_mut() {
            resource.set_volume(self.volume.linear());
        }
        self.events.emit(PlayerEvent::VolumeChanged(self.volume.percent()));
        self.volume.percent()
    }

    /// Apply a signal marshaled from the backend.
    ///
    /// Returns the stop reason when the signal ended the current resource.
    pub fn handle_signal(
        &mut self,
        generation: Generation,
        signal: BackendSignal,
    ) -> Option<StopReason> {
        if generation != self.generation || self.resource.is_none() {
            debug!(
                "discarding stale {:?} for generation {} (current {})",
                signal, generation, self.generation
            );
            return None;
        }

        match signal {
            BackendSignal::Finished => {
                if self.state == PlaybackState::Paused {
                    debug!("stream ran out while paused; ending on resume");
                    self.ended_while_paused = true;
                    return None;
                }
                if self.state != PlaybackState::Playing {
                    debug!("discarding spurious completion in state {}", self.state);
                    return None;
                }
                if let Some(track) = self.track.as_ref() {
                    info!("finished {}", track.path);
                }
                self.release();
                self.track = None;
                self.state = PlaybackState::Stopped;
                self.last_stop_reason = Some(StopReason::TrackEnded);
                self.events.emit(PlayerEvent::TrackEnded);
                Some(StopReason::TrackEnded)
            }
            BackendSignal::Fault(message) => {
                error!("playback fault: {}", message);
                self.release();
                self.track = None;
                self.state = PlaybackState::Error(message.clone());
                self.last_stop_reason = Some(StopReason::Error);
                self.events.emit(PlayerEvent::ErrorOccurred(message));
                Some(StopReason::Error)
            }
        }
    }

    fn release(&mut self) {
        self.ended_while_paused = false;
        if let Some(mut resource) = self.resource.take() {
            resource.close();
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// The loaded track with its position refreshed from the resource.
    pub fn track(&self) -> Option<Track> {
        let mut track = self.track.clone()?;
        track.position_seconds = self.position();
        Some(track)
    }

    /// Current position in seconds, 0 without a resource.
    pub fn position(&self) -> f64 {
        self.resource
            .as_ref()
            .map(|resource| resource.current_position())
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.resource
            .as_ref()
            .map(|resource| resource.total_duration())
            .unwrap_or(0.0)
    }

    pub fn volume(&self) -> f64 {
        self.volume.percent()
    }

    pub fn last_stop_reason(&self) -> Option<StopReason> {
        self.last_stop_reason
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }
}
