//! Error types shared by the playback engine, backends and runtime.

use thiserror::Error;

/// Failure to open an audio file into a playable resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// The path does not exist (or vanished between discovery and load).
    #[error("file not found: {0}")]
    NotFound(String),

    /// The decoder does not recognise the container or codec.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Headers were recognised but could not be parsed.
    #[error("corrupt audio file: {0}")]
    Corrupt(String),

    /// The output device or sink could not be created.
    #[error("output device error: {0}")]
    Device(String),
}

/// Failure to reposition a loaded resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeekError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("seeking not supported: {0}")]
    Unsupported(String),

    #[error("seek failed: {0}")]
    Failed(String),
}

/// Top-level error type for player operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Seek(#[from] SeekError),

    /// Output device failure while a track was playing.
    #[error("engine fault: {0}")]
    EngineFault(String),

    /// Operation not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Playlist index out of range.
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Settings could not be read or parsed.
    #[error("settings error: {0}")]
    Settings(String),

    /// The control thread is no longer running.
    #[error("player runtime disconnected")]
    Disconnected,
}

impl PlayerError {
    /// Return `true` for failures that belong to the engine-fault class.
    pub fn is_engine_fault(&self) -> bool {
        matches!(
            self,
            Self::EngineFault(_) | Self::Open(OpenError::Device(_))
        )
    }
}

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;
