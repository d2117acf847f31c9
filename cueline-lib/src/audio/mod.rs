//! Audio resources: one open file plus its output sink.
//!
//! An [`AudioBackend`] opens files into boxed [`AudioResource`]s. The engine
//! owns at most one resource at a time. Backends report natural end of stream
//! and mid-stream faults through a [`CompletionNotifier`], which may be called
//! from any thread.

mod memory;
pub mod probe;
mod rodio_backend;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{OpenError, SeekError};

pub use memory::{MemoryBackend, MemoryLibrary};
pub use rodio_backend::{RodioBackend, RodioResource};

/// Default seek end buffer in seconds.
pub const DEFAULT_END_BUFFER: f64 = 0.1;

/// Identity stamp of an opened resource.
pub type Generation = u64;

/// Signal raised by a backend about the resource it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendSignal {
    /// The stream played through to its end.
    Finished,
    /// The output failed mid-stream.
    Fault(String),
}

type SignalFn = dyn Fn(Generation, BackendSignal) + Send + Sync;

/// Thread-safe route from backend threads to the control thread.
#[derive(Clone)]
pub struct SignalRouter {
    route: Arc<SignalFn>,
}

impl SignalRouter {
    pub fn new<F>(route: F) -> Self
    where
        F: Fn(Generation, BackendSignal) + Send + Sync + 'static,
    {
        Self {
            route: Arc::new(route),
        }
    }

    /// A router that drops every signal.
    pub fn discard() -> Self {
        Self::new(|_, _| {})
    }

    /// Bind the router to one resource generation.
    pub fn notifier(&self, generation: Generation) -> CompletionNotifier {
        CompletionNotifier {
            generation,
            route: self.route.clone(),
        }
    }
}

impl fmt::Debug for SignalRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignalRouter")
    }
}

/// Completion callback handed to a backend for a single resource.
///
/// Calling it only posts a message; it never touches engine state.
#[derive(Clone)]
pub struct CompletionNotifier {
    generation: Generation,
    route: Arc<SignalFn>,
}

impl CompletionNotifier {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn finished(&self) {
        (self.route)(self.generation, BackendSignal::Finished);
    }

    pub fn fault(&self, message: impl Into<String>) {
        (self.route)(self.generation, BackendSignal::Fault(message.into()));
    }
}

impl fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Everything a backend needs to open one file.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub path: PathBuf,
    /// Seek end buffer in seconds.
    pub end_buffer: f64,
    /// Initial linear volume (`0.0..=1.0`).
    pub volume: f32,
    pub notifier: CompletionNotifier,
}

/// Factory for audio resources.
pub trait AudioBackend {
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn AudioResource>, OpenError>;
}

/// One loaded, decodable file and its output sink.
///
/// A freshly opened resource is paused at position 0.
pub trait AudioResource {
    /// Current playback position in seconds.
    fn current_position(&self) -> f64;

    /// Total duration in seconds, or 0 when unknown.
    fn total_duration(&self) -> f64;

    /// Move the playhead. Implementations clamp with [`clamp_seek_target`].
    fn seek(&mut self, seconds: f64) -> Result<(), SeekError>;

    /// Apply a linear volume (`0.0..=1.0`) to the live sink.
    fn set_volume(&mut self, level: f32);

    fn play(&mut self);

    fn pause(&mut self);

    /// Release the sink and file handle. Calling it again is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Clamp a seek request into `[0, duration - end_buffer]`.
///
/// When the duration is not longer than the end buffer every request clamps
/// to 0. NaN requests clamp to 0.
pub fn clamp_seek_target(requested: f64, duration: f64, end_buffer: f64) -> f64 {
    if requested.is_nan() || requested <= 0.0 {
        return 0.0;
    }
    if duration <= end_buffer {
        return 0.0;
    }
    let limit = duration - end_buffer;
    if requested >= limit {
        limit
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn clamps_below_zero_and_past_the_end() {
        assert_eq!(clamp_seek_target(-5.0, 200.0, DEFAULT_END_BUFFER), 0.0);
        let end = clamp_seek_target(199.95, 200.0, DEFAULT_END_BUFFER);
        assert!((end - 199.9).abs() < 1e-9);
        let past = clamp_seek_target(500.0, 200.0, DEFAULT_END_BUFFER);
        assert!((past - 199.9).abs() < 1e-9);
        assert_eq!(clamp_seek_target(42.0, 200.0, DEFAULT_END_BUFFER), 42.0);
    }

    #[test]
    fn short_tracks_always_clamp_to_zero() {
        assert_eq!(clamp_seek_target(0.05, 0.1, DEFAULT_END_BUFFER), 0.0);
        assert_eq!(clamp_seek_target(3.0, 0.0, DEFAULT_END_BUFFER), 0.0);
        assert_eq!(clamp_seek_target(f64::NAN, 10.0, DEFAULT_END_BUFFER), 0.0);
    }

    #[test]
    fn notifier_stamps_its_generation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let router = SignalRouter::new(move |generation, signal| {
            sink.lock().unwrap().push((generation, signal));
        });

        router.notifier(7).finished();
        router.notifier(8).fault("device lost");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (7, BackendSignal::Finished));
        assert_eq!(seen[1], (8, BackendSignal::Fault("device lost".to_string())));
    }
}
