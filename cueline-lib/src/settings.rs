//! Player configuration and the volume/playlist persistence contract.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};
use crate::playback::volume::{Volume, DEFAULT_VOLUME};
use crate::playlist::TrackRef;

/// Tunables read at startup. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub retry_delay_ms: u64,
    pub max_attempts: u32,
    pub end_buffer_seconds: f64,
    pub progress_interval_ms: u64,
    pub resync_threshold_seconds: f64,
    pub initial_volume: f64,
    pub auto_advance: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: 100,
            max_attempts: 3,
            end_buffer_seconds: 0.1,
            progress_interval_ms: 100,
            resync_threshold_seconds: 0.1,
            initial_volume: DEFAULT_VOLUME,
            auto_advance: true,
        }
    }
}

impl PlayerSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|err| PlayerError::Settings(format!("invalid settings: {}", err)))?;
        Ok(settings.normalized())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|err| {
            PlayerError::Settings(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| PlayerError::Settings(err.to_string()))
    }

    /// Coerce out-of-range values into their legal ranges.
    pub fn normalized(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self.progress_interval_ms = self.progress_interval_ms.max(1);
        self.end_buffer_seconds = non_negative(self.end_buffer_seconds);
        self.resync_threshold_seconds = non_negative(self.resync_threshold_seconds);
        self.initial_volume = Volume::new(self.initial_volume).percent();
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

/// Where volume and playlist survive between sessions.
pub trait SettingsStore {
    fn volume(&self) -> Option<f64>;
    fn set_volume(&mut self, percent: f64);
    fn playlist(&self) -> Option<Vec<TrackRef>>;
    fn set_playlist(&mut self, tracks: &[TrackRef]);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    playlist: Option<Vec<TrackRef>>,
}

/// In-memory store. Clones share contents, so a test can keep one clone and
/// hand the other to the runtime.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    state: Arc<Mutex<StoredState>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(self, percent: f64) -> Self {
        self.lock().volume = Some(percent);
        self
    }

    pub fn with_playlist(self, tracks: Vec<TrackRef>) -> Self {
        self.lock().playlist = Some(tracks);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoredState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn volume(&self) -> Option<f64> {
        self.lock().volume
    }

    fn set_volume(&mut self, percent: f64) {
        self.lock().volume = Some(percent);
    }

    fn playlist(&self) -> Option<Vec<TrackRef>> {
        self.lock().playlist.clone()
    }

    fn set_playlist(&mut self, tracks: &[TrackRef]) {
        self.lock().playlist = Some(tracks.to_vec());
    }
}

/// Store persisted as a JSON file, rewritten on every change.
///
/// A missing or unreadable file starts empty. Write failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    state: StoredState,
}

impl JsonSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!("ignoring unreadable state file {}: {}", path.display(), err);
                StoredState::default()
            }),
            Err(err) => {
                debug!("no state at {}: {}", path.display(), err);
                StoredState::default()
            }
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) {
        let json = match serde_json::to_string_pretty(&self.state) {
            Ok(json) => json,
            Err(err) => {
                warn!("failed to encode state: {}", err);
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, json) {
            warn!("failed to write state to {}: {}", self.path.display(), err);
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn volume(&self) -> Option<f64> {
        self.state.volume
    }

    fn set_volume(&mut self, percent: f64) {
        self.state.volume = Some(percent);
        self.save();
    }

    fn playlist(&self) -> Option<Vec<TrackRef>> {
        self.state.playlist.clone()
    }

    fn set_playlist(&mut self, tracks: &[TrackRef]) {
        self.state.playlist = Some(tracks.to_vec());
        self.save();
    }
}
