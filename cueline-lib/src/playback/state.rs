use std::fmt;

/// Transport state of the playback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Stopped,
    /// A resource is open and paused at its start position.
    Loading,
    Playing,
    Paused,
    Error(String),
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        *self == PlaybackState::Playing
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PlaybackState::Error(_))
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => f.write_str("stopped"),
            PlaybackState::Loading => f.write_str("loading"),
            PlaybackState::Playing => f.write_str("playing"),
            PlaybackState::Paused => f.write_str("paused"),
            PlaybackState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Why the engine last left an active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    TrackEnded,
    Error,
}

/// The file currently held by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub path: String,
    /// Seconds, 0 until known.
    pub duration_seconds: f64,
    pub position_seconds: f64,
}

impl Track {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            duration_seconds: 0.0,
            position_seconds: 0.0,
        }
    }
}
