//! # Cueline Playback Library
//!
//! Single-track audio playback with playlist auto-advance and bounded retry.
//! A [`runtime::Runtime`] is the control thread: it owns the
//! [`playback::PlaybackEngine`], samples progress, routes natural track ends
//! to the [`playlist::AutoAdvanceController`], and serves commands submitted
//! through a [`runtime::PlayerHandle`].
//!
//! Audio output goes through an [`audio::AudioBackend`]: the rodio backend for
//! real devices, or the in-memory backend for headless use.

pub mod audio;
pub mod error;
pub mod playback;
pub mod playlist;
pub mod runtime;
pub mod settings;
pub mod timer;

pub use error::{OpenError, PlayerError, Result, SeekError};
pub use playback::{PlaybackState, PlayerEvent, StopReason, Track};
pub use playlist::TrackRef;
pub use runtime::{Command, Pending, PlayerHandle, Reply, Runtime, Snapshot};
pub use settings::{JsonSettingsStore, MemorySettingsStore, PlayerSettings, SettingsStore};
