//! Headless backend that "plays" registered tracks on a stopwatch.
//!
//! Nothing is decoded. A shared [`MemoryLibrary`] decides which paths open,
//! which fail and when a stream finishes, which makes it suitable for
//! simulations and for exercising the engine without an output device.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::audio::{
    clamp_seek_target, AudioBackend, AudioResource, CompletionNotifier, OpenRequest,
};
use crate::error::{OpenError, SeekError};
use crate::timer::{SharedTime, Stopwatch};

#[derive(Debug, Clone)]
enum Entry {
    Playable { duration: f64 },
    Broken(OpenError),
}

#[derive(Debug)]
struct LiveState {
    path: String,
    volume: f32,
    playing: bool,
    closed: bool,
    notifier: CompletionNotifier,
}

#[derive(Debug, Default)]
struct LibraryState {
    entries: HashMap<String, Entry>,
    opens: HashMap<String, usize>,
    live: Vec<Arc<Mutex<LiveState>>>,
    last_notifier: Option<CompletionNotifier>,
    closes: usize,
}

impl LibraryState {
    fn prune_closed(&mut self) {
        self.live.retain(|live| !lock(live).closed);
    }
}

/// Shared catalogue of in-memory tracks plus inspection hooks.
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    state: Arc<Mutex<LibraryState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a playable track.
    pub fn add_track(&self, path: impl Into<String>, duration_seconds: f64) {
        lock(&self.state).entries.insert(
            path.into(),
            Entry::Playable {
                duration: duration_seconds.max(0.0),
            },
        );
    }

    /// Register a path that fails to open with `error`.
    pub fn add_broken(&self, path: impl Into<String>, error: OpenError) {
        lock(&self.state)
            .entries
            .insert(path.into(), Entry::Broken(error));
    }

    /// Forget a path so later opens and seeks report it missing.
    pub fn remove(&self, path: &str) {
        lock(&self.state).entries.remove(path);
    }

    /// Fire natural end-of-stream for the most recently opened live resource.
    ///
    /// Safe to call from any thread. Returns `false` when nothing is live.
    pub fn finish_current(&self) -> bool {
        match self.current_notifier() {
            Some(notifier) => {
                notifier.finished();
                true
            }
            None => false,
        }
    }

    /// Fire a mid-stream fault for the most recently opened live resource.
    pub fn fault_current(&self, message: &str) -> bool {
        match self.current_notifier() {
            Some(notifier) => {
                notifier.fault(message);
                true
            }
            None => false,
        }
    }

    /// Notifier of the most recently opened resource, even if it was closed.
    ///
    /// Used to replay a completion that raced with a stop.
    pub fn last_notifier(&self) -> Option<CompletionNotifier> {
        lock(&self.state).last_notifier.clone()
    }

    fn current_notifier(&self) -> Option<CompletionNotifier> {
        self.with_current(|live| live.notifier.clone())
    }

    /// Number of open attempts made for `path`, failed ones included.
    pub fn open_count(&self, path: &str) -> usize {
        lock(&self.state).opens.get(path).copied().unwrap_or(0)
    }

    /// Number of resources opened and not yet closed.
    pub fn live_count(&self) -> usize {
        let state = lock(&self.state);
        let count = state.live.iter().filter(|live| !lock(live).closed).count();
        count
    }

    /// Number of close calls that actually released a resource.
    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }

    /// Path of the live resource, if any.
    pub fn current_path(&self) -> Option<String> {
        self.with_current(|live| live.path.clone())
    }

    /// Linear volume last applied to the live resource.
    pub fn current_volume(&self) -> Option<f32> {
        self.with_current(|live| live.volume)
    }

    /// Whether the live resource is currently playing.
    pub fn current_playing(&self) -> Option<bool> {
        self.with_current(|live| live.playing)
    }

    fn with_current<R>(&self, f: impl Fn(&LiveState) -> R) -> Option<R> {
        let state = lock(&self.state);
        for live in state.live.iter().rev() {
            let live = lock(live);
            if !live.closed {
                return Some(f(&*live));
            }
        }
        None
    }

    fn contains(&self, path: &str) -> bool {
        lock(&self.state).entries.contains_key(path)
    }

    fn record_close(&self) {
        let mut state = lock(&self.state);
        state.closes += 1;
        state.prune_closed();
    }
}

/// [`AudioBackend`] over a [`MemoryLibrary`].
pub struct MemoryBackend {
    library: MemoryLibrary,
    time: SharedTime,
}

impl MemoryBackend {
    pub fn new(library: MemoryLibrary, time: SharedTime) -> Self {
        Self { library, time }
    }

    pub fn library(&self) -> &MemoryLibrary {
        &self.library
    }
}

impl AudioBackend for MemoryBackend {
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn AudioResource>, OpenError> {
        let path = request.path.display().to_string();
        let mut state = lock(&self.library.state);
        *state.opens.entry(path.clone()).or_insert(0) += 1;

        let duration = match state.entries.get(&path) {
            Some(Entry::Playable { duration }) => *duration,
            Some(Entry::Broken(err)) => return Err(err.clone()),
            None => return Err(OpenError::NotFound(path)),
        };

        let live = Arc::new(Mutex::new(LiveState {
            path: path.clone(),
            volume: request.volume,
            playing: false,
            closed: false,
            notifier: request.notifier.clone(),
        }));
        state.prune_closed();
        state.live.push(live.clone());
        state.last_notifier = Some(request.notifier);
        drop(state);

        Ok(Box::new(MemoryResource {
            library: self.library.clone(),
            live,
            path,
            duration,
            end_buffer: request.end_buffer,
            clock: Stopwatch::new(self.time.clone()),
        }))
    }
}

struct MemoryResource {
    library: MemoryLibrary,
    live: Arc<Mutex<LiveState>>,
    path: String,
    duration: f64,
    end_buffer: f64,
    clock: Stopwatch,
}

impl AudioResource for MemoryResource {
    fn current_position(&self) -> f64 {
        self.clock.elapsed().as_secs_f64().min(self.duration)
    }

    fn total_duration(&self) -> f64 {
        self.duration
    }

    fn seek(&mut self, seconds: f64) -> Result<(), SeekError> {
        if self.is_closed() {
            return Err(SeekError::Failed(format!("{} is closed", self.path)));
        }
        if !self.library.contains(&self.path) {
            return Err(SeekError::NotFound(self.path.clone()));
        }
        let target = clamp_seek_target(seconds, self.duration, self.end_buffer);
        self.clock.set(Duration::from_secs_f64(target));
        Ok(())
    }

    fn set_volume(&mut self, level: f32) {
        lock(&self.live).volume = level.clamp(0.0, 1.0);
    }

    fn play(&mut self) {
        if self.is_closed() {
            return;
        }
        self.clock.start();
        lock(&self.live).playing = true;
    }

    fn pause(&mut self) {
        self.clock.pause();
        lock(&self.live).playing = false;
    }

    fn close(&mut self) {
        let mut live = lock(&self.live);
        if live.closed {
            return;
        }
        live.closed = true;
        live.playing = false;
        drop(live);
        self.clock.pause();
        self.library.record_close();
    }

    fn is_closed(&self) -> bool {
        lock(&self.live).closed
    }
}

impl Drop for MemoryResource {
    fn drop(&mut self) {
        self.close();
    }
}
