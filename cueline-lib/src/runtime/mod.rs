//! The control thread.
//!
//! A [`Runtime`] owns the engine, the progress clock, the auto-advance
//! controller and the scheduler, and is the only place player state changes.
//! Commands from other threads arrive through a [`PlayerHandle`]; backend
//! completions arrive through the [`SignalRouter`] the runtime installs on the
//! engine. Both land on the same queue and are applied in arrival order.

pub mod scheduler;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::audio::{AudioBackend, BackendSignal, Generation, SignalRouter};
use crate::error::{PlayerError, Result};
use crate::playback::{
    EventHub, PlaybackEngine, PlaybackState, ProgressClock, StopReason, Subscription, Track,
};
use crate::playlist::{AdvanceState, AutoAdvanceController, TrackRef};
use crate::settings::{PlayerSettings, SettingsStore};
use crate::timer::SharedTime;

use scheduler::{Scheduler, TimerId, TimerKind};

/// Requests accepted by the control thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load {
        path: String,
        start_position: Option<f64>,
    },
    Play,
    Pause,
    Resume,
    Stop,
    Seek(f64),
    SetVolume(f64),
    SetPlaylist(Vec<TrackRef>),
    Select(usize),
    Next,
    Previous,
    SetAutoAdvance(bool),
    BeginSeekDrag,
    DragTo(f64),
    EndSeekDrag,
    /// Read-only view of the player for UIs.
    Snapshot,
    Shutdown,
}

/// Successful outcome of a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Track(Option<Track>),
    Position(f64),
    Volume(f64),
    Snapshot(Box<Snapshot>),
}

/// Point-in-time view of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: PlaybackState,
    pub track: Option<Track>,
    pub position: f64,
    pub duration: f64,
    pub volume: f64,
    pub auto_advance: bool,
    pub advance_state: AdvanceState,
    pub playlist: Vec<TrackRef>,
    pub current_index: Option<usize>,
}

enum Inbound {
    Command {
        command: Command,
        reply: Sender<Result<Reply>>,
    },
    Backend {
        generation: Generation,
        signal: BackendSignal,
    },
}

/// Cloneable, thread-safe entry point into a [`Runtime`].
#[derive(Clone)]
pub struct PlayerHandle {
    sender: Sender<Inbound>,
}

impl PlayerHandle {
    /// Queue `command` for the control thread.
    pub fn submit(&self, command: Command) -> Pending {
        let (reply, receiver) = mpsc::channel();
        match self.sender.send(Inbound::Command { command, reply }) {
            Ok(()) => Pending {
                receiver: Some(receiver),
            },
            Err(_) => Pending { receiver: None },
        }
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlayerHandle")
    }
}

/// Reply to a submitted command.
#[must_use = "a submitted command's outcome is only observable through wait()"]
#[derive(Debug)]
pub struct Pending {
    receiver: Option<Receiver<Result<Reply>>>,
}

impl Pending {
    /// Block until the control thread has applied the command.
    pub fn wait(self) -> Result<Reply> {
        let receiver = self.receiver.ok_or(PlayerError::Disconnected)?;
        receiver.recv().map_err(|_| PlayerError::Disconnected)?
    }

    /// Block for at most `timeout`. `None` when the reply is not in yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Reply>> {
        let Some(receiver) = self.receiver.as_ref() else {
            return Some(Err(PlayerError::Disconnected));
        };
        match receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(PlayerError::Disconnected)),
        }
    }
}

pub struct Runtime {
    engine: PlaybackEngine,
    progress: ProgressClock,
    advance: AutoAdvanceController,
    scheduler: Scheduler,
    events: EventHub,
    store: Option<Box<dyn SettingsStore>>,
    inbox: Receiver<Inbound>,
    sender: Sender<Inbound>,
    tick_timer: Option<TimerId>,
    running: bool,
}

impl Runtime {
    /// Build a runtime around `backend`.
    ///
    /// # Arguments
    ///
    /// * `backend` - Audio backend the engine opens files with.
    /// * `settings` - Startup tunables.
    /// * `time` - Clock shared by the scheduler.
    pub fn new(backend: Box<dyn AudioBackend>, settings: &PlayerSettings, time: SharedTime) -> Self {
        let settings = settings.clone().normalized();
        let (sender, inbox) = mpsc::channel();
        let events = EventHub::new();

        let backend_sender = Mutex::new(sender.clone());
        let router = SignalRouter::new(move |generation, signal| {
            let sender = backend_sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if sender.send(Inbound::Backend { generation, signal }).is_err() {
                debug!("control thread gone; dropping backend signal");
            }
        });

        let mut engine = PlaybackEngine::new(backend, router, events.clone());
        engine.set_end_buffer(settings.end_buffer_seconds);
        engine.set_volume(settings.initial_volume);

        let progress = ProgressClock::new(
            settings.progress_interval(),
            settings.resync_threshold_seconds,
            events.clone(),
        );
        let advance = AutoAdvanceController::new(events.clone())
            .with_retry_delay(settings.retry_delay())
            .with_max_attempts(settings.max_attempts)
            .with_auto_advance(settings.auto_advance);

        Self {
            engine,
            progress,
            advance,
            scheduler: Scheduler::new(time),
            events,
            store: None,
            inbox,
            sender,
            tick_timer: None,
            running: true,
        }
    }

    /// Attach a settings store, restoring its volume and playlist.
    ///
    /// The playlist is restored without starting playback.
    pub fn with_store(mut self, store: Box<dyn SettingsStore>) -> Self {
        if let Some(volume) = store.volume() {
            self.engine.set_volume(volume);
        }
        if let Some(tracks) = store.playlist() {
            info!("restored playlist of {} track(s)", tracks.len());
            self.advance.set_playlist(tracks, &mut self.scheduler);
        }
        self.store = Some(store);
        self
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn advance(&self) -> &AutoAdvanceController {
        &self.advance
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn progress(&self) -> &ProgressClock {
        &self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.engine.state().clone(),
            track: self.engine.track(),
            position: self.engine.position(),
            duration: self.engine.duration(),
            volume: self.engine.volume(),
            auto_advance: self.advance.auto_advance(),
            advance_state: self.advance.state(),
            playlist: self.advance.playlist().tracks().to_vec(),
            current_index: self.advance.playlist().current_index(),
        }
    }

    /// Apply one command on the calling (control) thread.
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        debug!("command {:?}", command);
        let result = self.dispatch(command);
        self.sync_tick_timer();
        result
    }

    fn dispatch(&mut self, command: Command) -> Result<Reply> {
        match command {
            Command::Load {
                path,
                start_position,
            } => {
                self.advance.release_cursor(&mut self.scheduler);
                self.progress.reset();
                let track = self.engine.load(&path, start_position)?;
                Ok(Reply::Track(Some(track)))
            }
            Command::Play | Command::Resume => {
                self.engine.play()?;
                Ok(Reply::Done)
            }
            Command::Pause => {
                self.engine.pause();
                Ok(Reply::Done)
            }
            Command::Stop => {
                self.advance.cancel_retry(&mut self.scheduler);
                self.engine.stop(false);
                self.progress.reset();
                Ok(Reply::Done)
            }
            Command::Seek(seconds) => Ok(Reply::Position(self.engine.seek(seconds)?)),
            Command::SetVolume(percent) => {
                let volume = self.engine.set_volume(percent);
                if let Some(store) = self.store.as_mut() {
                    store.set_volume(volume);
                }
                Ok(Reply::Volume(volume))
            }
            Command::SetPlaylist(tracks) => {
                if let Some(store) = self.store.as_mut() {
                    store.set_playlist(&tracks);
                }
                self.advance.set_playlist(tracks, &mut self.scheduler);
                Ok(Reply::Done)
            }
            Command::Select(index) => {
                self.progress.reset();
                let track = self
                    .advance
                    .select(index, &mut self.engine, &mut self.scheduler)?;
                Ok(Reply::Track(Some(track)))
            }
            Command::Next => {
                self.progress.reset();
                let track = self.advance.next(&mut self.engine, &mut self.scheduler)?;
                Ok(Reply::Track(track))
            }
            Command::Previous => {
                self.progress.reset();
                let track = self
                    .advance
                    .previous(&mut self.engine, &mut self.scheduler)?;
                Ok(Reply::Track(track))
            }
            Command::SetAutoAdvance(enabled) => {
                self.advance.set_auto_advance(enabled, &mut self.scheduler);
                Ok(Reply::Done)
            }
            Command::BeginSeekDrag => {
                self.progress.begin_drag();
                Ok(Reply::Done)
            }
            Command::DragTo(position) => {
                self.progress.drag_to(position);
                Ok(Reply::Done)
            }
            Command::EndSeekDrag => {
                self.progress.end_drag(&self.engine);
                Ok(Reply::Done)
            }
            Command::Snapshot => Ok(Reply::Snapshot(Box::new(self.snapshot()))),
            Command::Shutdown => {
                info!("shutting down");
                self.advance.cancel_retry(&mut self.scheduler);
                self.engine.stop(true);
                self.cancel_tick();
                self.running = false;
                Ok(Reply::Done)
            }
        }
    }

    fn handle_backend(&mut self, generation: Generation, signal: BackendSignal) {
        if let Some(reason) = self.engine.handle_signal(generation, signal) {
            self.progress.reset();
            if reason == StopReason::TrackEnded {
                self.advance
                    .on_track_ended(&mut self.engine, &mut self.scheduler);
            }
        }
        self.sync_tick_timer();
    }

    fn fire_due(&mut self) {
        while let Some((id, kind)) = self.scheduler.pop_due() {
            match kind {
                TimerKind::ProgressTick => {
                    if self.tick_timer == Some(id) {
                        self.tick_timer = None;
                        self.progress.tick(&self.engine);
                    }
                }
                TimerKind::RetryAdvance => {
                    self.advance
                        .on_retry_timer(id, &mut self.engine, &mut self.scheduler);
                }
            }
            self.sync_tick_timer();
        }
    }

    /// Arm the progress tick while playing, disarm it otherwise.
    fn sync_tick_timer(&mut self) {
        if !self.running {
            return;
        }
        if self.engine.state().is_playing() {
            if self.tick_timer.is_none() {
                let id = self
                    .scheduler
                    .schedule_in(self.progress.interval(), TimerKind::ProgressTick);
                self.tick_timer = Some(id);
            }
        } else {
            self.cancel_tick();
        }
    }

    fn cancel_tick(&mut self) {
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn process(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Command { command, reply } => {
                let result = self.execute(command);
                if reply.send(result).is_err() {
                    debug!("command submitter went away before the reply");
                }
            }
            Inbound::Backend { generation, signal } => self.handle_backend(generation, signal),
        }
    }

    /// Apply everything that is ready without blocking. Returns the number of
    /// queued messages processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        self.fire_due();
        while self.running {
            match self.inbox.try_recv() {
                Ok(inbound) => {
                    self.process(inbound);
                    processed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.fire_due();
        processed
    }

    /// Serve the queue until a `Shutdown` command arrives.
    pub fn run(&mut self) {
        while self.running {
            self.fire_due();
            let received = match self.scheduler.time_until_next() {
                Some(wait) => match self.inbox.recv_timeout(wait) {
                    Ok(inbound) => Some(inbound),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.inbox.recv() {
                    Ok(inbound) => Some(inbound),
                    Err(_) => break,
                },
            };
            if let Some(inbound) = received {
                self.process(inbound);
            }
        }
    }

    /// Serve the queue for at most `budget` of wall time.
    ///
    /// Returns `false` once the runtime has shut down.
    pub fn run_for(&mut self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        while self.running {
            self.fire_due();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let wait = self
                .scheduler
                .time_until_next()
                .map_or(remaining, |next| next.min(remaining));
            match self.inbox.recv_timeout(wait) {
                Ok(inbound) => self.process(inbound),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemoryBackend, MemoryLibrary};
    use crate::playback::PlayerEvent;
    use crate::settings::MemorySettingsStore;
    use crate::timer::ManualClock;
    use std::sync::Arc;

    fn runtime(clock: &ManualClock, library: &MemoryLibrary) -> Runtime {
        let backend = MemoryBackend::new(library.clone(), Arc::new(clock.clone()));
        Runtime::new(
            Box::new(backend),
            &PlayerSettings::default(),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn progress_ticks_only_while_playing() {
        let clock = ManualClock::new();
        let library = MemoryLibrary::new();
        library.add_track("a.mp3", 60.0);
        let mut rt = runtime(&clock, &library);

        rt.execute(Command::Load {
            path: "a.mp3".to_string(),
            start_position: None,
        })
        .expect("load");
        assert_eq!(rt.scheduler().pending(TimerKind::ProgressTick), 0);

        rt.execute(Command::Play).expect("play");
        assert_eq!(rt.scheduler().pending(TimerKind::ProgressTick), 1);

        let events = rt.subscribe();
        for _ in 0..3 {
            clock.advance(Duration::from_millis(100));
            rt.pump();
        }
        let positions = events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::PositionChanged(_)))
            .count();
        assert_eq!(positions, 3);

        rt.execute(Command::Pause).expect("pause");
        assert_eq!(rt.scheduler().pending(TimerKind::ProgressTick), 0);
    }

    #[test]
    fn backend_completion_triggers_advance() {
        let clock = ManualClock::new();
        let library = MemoryLibrary::new();
        library.add_track("a.mp3", 60.0);
        library.add_track("b.mp3", 60.0);
        let mut rt = runtime(&clock, &library);
        rt.execute(Command::SetPlaylist(vec!["a.mp3".into(), "b.mp3".into()]))
            .expect("playlist");
        rt.execute(Command::Select(0)).expect("select");

        assert!(library.finish_current());
        rt.pump();

        assert_eq!(library.current_path().as_deref(), Some("b.mp3"));
        assert_eq!(rt.snapshot().current_index, Some(1));
    }

    #[test]
    fn store_is_restored_and_updated() {
        let clock = ManualClock::new();
        let library = MemoryLibrary::new();
        let store = MemorySettingsStore::new()
            .with_volume(35.0)
            .with_playlist(vec!["a.mp3".into()]);
        let mut rt = runtime(&clock, &library).with_store(Box::new(store.clone()));

        let snapshot = rt.snapshot();
        assert_eq!(snapshot.volume, 35.0);
        assert_eq!(snapshot.playlist.len(), 1);
        assert_eq!(snapshot.state, PlaybackState::Stopped);

        rt.execute(Command::SetVolume(120.0)).expect("volume");
        assert_eq!(store.volume(), Some(100.0));
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let clock = ManualClock::new();
        let library = MemoryLibrary::new();
        let mut rt = runtime(&clock, &library);
        let pending = rt.handle().submit(Command::Shutdown);
        rt.run();
        assert_eq!(pending.wait(), Ok(Reply::Done));
        assert!(!rt.is_running());
    }
}
