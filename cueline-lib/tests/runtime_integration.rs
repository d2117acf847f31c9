use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cueline_lib::audio::{MemoryBackend, MemoryLibrary};
use cueline_lib::playback::Subscription;
use cueline_lib::playlist::AdvanceState;
use cueline_lib::runtime::scheduler::TimerKind;
use cueline_lib::timer::ManualClock;
use cueline_lib::{
    Command, JsonSettingsStore, PlaybackState, PlayerEvent, PlayerHandle, PlayerSettings, Reply,
    Runtime, SettingsStore, TrackRef,
};

const WAIT: Duration = Duration::from_secs(5);

fn library() -> MemoryLibrary {
    let library = MemoryLibrary::new();
    library.add_track("a.mp3", 180.0);
    library.add_track("b.mp3", 240.0);
    library.add_track("c.mp3", 200.0);
    library
}

fn runtime(clock: &ManualClock, library: &MemoryLibrary) -> Runtime {
    let backend = MemoryBackend::new(library.clone(), Arc::new(clock.clone()));
    Runtime::new(
        Box::new(backend),
        &PlayerSettings::default(),
        Arc::new(clock.clone()),
    )
}

fn playlist(paths: &[&str]) -> Vec<TrackRef> {
    paths.iter().map(|path| TrackRef::new(*path)).collect()
}

/// Run a runtime on its own control thread and hand back a handle to it.
fn spawn_runtime(
    clock: ManualClock,
    library: MemoryLibrary,
) -> (PlayerHandle, Subscription, thread::JoinHandle<()>) {
    let (ready_tx, ready_rx) = mpsc::channel();
    let join = thread::spawn(move || {
        let mut rt = runtime(&clock, &library);
        ready_tx
            .send((rt.handle(), rt.subscribe()))
            .expect("send handle");
        rt.run();
    });
    let (handle, events) = ready_rx.recv_timeout(WAIT).expect("runtime ready");
    (handle, events, join)
}

fn snapshot(handle: &PlayerHandle) -> cueline_lib::Snapshot {
    match handle.submit(Command::Snapshot).wait().expect("snapshot") {
        Reply::Snapshot(snapshot) => *snapshot,
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn natural_end_advances_to_the_next_track() {
    let clock = ManualClock::new();
    let library = library();
    let (handle, events, join) = spawn_runtime(clock, library.clone());

    handle
        .submit(Command::SetPlaylist(playlist(&["a.mp3", "b.mp3"])))
        .wait()
        .expect("playlist");
    handle.submit(Command::Select(0)).wait().expect("select");

    let finisher = library.clone();
    thread::spawn(move || assert!(finisher.finish_current()))
        .join()
        .expect("finisher thread");

    let view = snapshot(&handle);
    assert_eq!(view.state, PlaybackState::Playing);
    assert_eq!(view.current_index, Some(1));
    assert_eq!(view.track.map(|t| t.path), Some("b.mp3".to_string()));

    let seen = events.drain();
    assert!(seen.contains(&PlayerEvent::TrackEnded));
    assert!(seen
        .iter()
        .any(|e| matches!(e, PlayerEvent::Advanced(t) if t.path == "b.mp3")));

    handle.submit(Command::Shutdown).wait().expect("shutdown");
    join.join().expect("control thread");
}

#[test]
fn missing_next_track_is_retried_three_times_then_given_up() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    let events = rt.subscribe();

    rt.execute(Command::SetPlaylist(playlist(&["a.mp3", "missing.mp3"])))
        .expect("playlist");
    rt.execute(Command::Select(0)).expect("select");
    assert!(library.finish_current());
    rt.pump();
    assert_eq!(rt.advance().state(), AdvanceState::RetryPending);

    for _ in 0..10 {
        clock.advance(Duration::from_millis(100));
        rt.pump();
    }

    let seen = events.drain();
    let attempts: Vec<(u32, u32)> = seen
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::RetryAttempted { attempt, max, .. } => Some((*attempt, *max)),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![(1, 3), (2, 3), (3, 3)]);

    let failed: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, PlayerEvent::PlaybackFailed(_)))
        .collect();
    assert_eq!(failed.len(), 1);
    let failed_at = seen
        .iter()
        .position(|e| matches!(e, PlayerEvent::PlaybackFailed(_)))
        .expect("failure event");
    assert!(seen[failed_at..]
        .iter()
        .all(|e| !matches!(e, PlayerEvent::RetryAttempted { .. })));

    assert_eq!(library.open_count("missing.mp3"), 3);
    assert_eq!(rt.scheduler().pending(TimerKind::RetryAdvance), 0);
    assert_eq!(*rt.engine().state(), PlaybackState::Stopped);
}

#[test]
fn stop_before_play_never_starts() {
    let clock = ManualClock::new();
    let library = library();
    let (handle, events, join) = spawn_runtime(clock, library.clone());

    handle
        .submit(Command::Load {
            path: "a.mp3".to_string(),
            start_position: None,
        })
        .wait()
        .expect("load");
    handle.submit(Command::Stop).wait().expect("stop");

    assert_eq!(snapshot(&handle).state, PlaybackState::Stopped);
    let seen = events.drain();
    assert!(!seen.contains(&PlayerEvent::Started));
    assert!(!seen.contains(&PlayerEvent::TrackEnded));
    assert_eq!(library.live_count(), 0);

    handle.submit(Command::Shutdown).wait().expect("shutdown");
    join.join().expect("control thread");
}

#[test]
fn seek_is_clamped_to_the_end_buffer() {
    let clock = ManualClock::new();
    let library = MemoryLibrary::new();
    library.add_track("long.flac", 200.0);
    let mut rt = runtime(&clock, &library);
    rt.execute(Command::Load {
        path: "long.flac".to_string(),
        start_position: None,
    })
    .expect("load");

    assert_eq!(rt.execute(Command::Seek(-5.0)), Ok(Reply::Position(0.0)));
    match rt.execute(Command::Seek(199.95)) {
        Ok(Reply::Position(position)) => assert!((position - 199.9).abs() < 1e-6),
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn completion_for_a_stopped_track_is_discarded() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    let events = rt.subscribe();

    rt.execute(Command::Load {
        path: "a.mp3".to_string(),
        start_position: None,
    })
    .expect("load");
    rt.execute(Command::Play).expect("play");
    let stale = library.last_notifier().expect("notifier");

    rt.execute(Command::Stop).expect("stop");
    rt.execute(Command::Load {
        path: "b.mp3".to_string(),
        start_position: None,
    })
    .expect("load");
    rt.execute(Command::Play).expect("play");
    events.drain();

    stale.finished();
    rt.pump();

    assert_eq!(*rt.engine().state(), PlaybackState::Playing);
    assert_eq!(library.current_path().as_deref(), Some("b.mp3"));
    assert!(!events.drain().contains(&PlayerEvent::TrackEnded));
}

#[test]
fn manual_load_cancels_a_pending_retry() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);

    rt.execute(Command::SetPlaylist(playlist(&["a.mp3", "missing.mp3"])))
        .expect("playlist");
    rt.execute(Command::Select(0)).expect("select");
    library.finish_current();
    rt.pump();
    assert_eq!(rt.scheduler().pending(TimerKind::RetryAdvance), 1);

    rt.execute(Command::Load {
        path: "c.mp3".to_string(),
        start_position: None,
    })
    .expect("load");
    assert!(rt.advance().session().is_none());
    assert_eq!(rt.scheduler().pending(TimerKind::RetryAdvance), 0);

    clock.advance(Duration::from_secs(1));
    rt.pump();
    assert_eq!(library.open_count("missing.mp3"), 1);
}

#[test]
fn mid_stream_fault_surfaces_an_error() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    let events = rt.subscribe();

    rt.execute(Command::SetPlaylist(playlist(&["a.mp3", "b.mp3"])))
        .expect("playlist");
    rt.execute(Command::Select(0)).expect("select");
    assert!(library.fault_current("device unplugged"));
    rt.pump();

    assert!(rt.engine().state().is_error());
    assert_eq!(library.live_count(), 0);
    assert_eq!(rt.scheduler().pending(TimerKind::ProgressTick), 0);
    let seen = events.drain();
    assert!(seen.contains(&PlayerEvent::ErrorOccurred("device unplugged".to_string())));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, PlayerEvent::Advanced(_))));
}

#[test]
fn track_ending_during_pause_advances_after_resume() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    let events = rt.subscribe();

    rt.execute(Command::SetPlaylist(playlist(&["a.mp3", "b.mp3"])))
        .expect("playlist");
    rt.execute(Command::Select(0)).expect("select");
    clock.advance(Duration::from_secs(10));
    rt.execute(Command::Pause).expect("pause");
    assert!(library.finish_current());
    rt.pump();
    assert_eq!(*rt.engine().state(), PlaybackState::Paused);
    assert!(!events.drain().contains(&PlayerEvent::TrackEnded));

    rt.execute(Command::Resume).expect("resume");
    rt.pump();

    assert_eq!(library.current_path().as_deref(), Some("b.mp3"));
    assert_eq!(rt.advance().playlist().current_index(), Some(1));
    let seen = events.drain();
    assert!(seen.contains(&PlayerEvent::TrackEnded));
    assert!(seen
        .iter()
        .any(|e| matches!(e, PlayerEvent::Advanced(t) if t.path == "b.mp3")));
}

#[test]
fn loading_by_path_detaches_the_playlist() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    let events = rt.subscribe();

    rt.execute(Command::SetPlaylist(playlist(&["a.mp3", "b.mp3"])))
        .expect("playlist");
    rt.execute(Command::Select(0)).expect("select");
    rt.execute(Command::Load {
        path: "c.mp3".to_string(),
        start_position: None,
    })
    .expect("load");
    rt.execute(Command::Play).expect("play");
    assert_eq!(rt.snapshot().current_index, None);
    events.drain();

    assert!(library.finish_current());
    rt.pump();

    assert_eq!(library.open_count("b.mp3"), 0);
    assert_eq!(
        events.drain(),
        vec![PlayerEvent::TrackEnded, PlayerEvent::PlaylistEnded]
    );

    rt.execute(Command::Next).expect("next");
    assert_eq!(library.current_path().as_deref(), Some("a.mp3"));
}

#[test]
fn drag_suspends_progress_events() {
    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library);
    rt.execute(Command::Load {
        path: "a.mp3".to_string(),
        start_position: None,
    })
    .expect("load");
    rt.execute(Command::Play).expect("play");
    let events = rt.subscribe();

    rt.execute(Command::BeginSeekDrag).expect("begin");
    rt.execute(Command::DragTo(60.0)).expect("drag");
    for _ in 0..5 {
        clock.advance(Duration::from_millis(100));
        rt.pump();
    }
    assert!(events.drain().is_empty());

    rt.execute(Command::Seek(60.0)).expect("seek");
    rt.execute(Command::EndSeekDrag).expect("end");
    assert_eq!(events.drain(), vec![PlayerEvent::PositionChanged(60.0)]);

    clock.advance(Duration::from_millis(100));
    rt.pump();
    assert!(events
        .drain()
        .iter()
        .any(|e| matches!(e, PlayerEvent::PositionChanged(p) if *p > 60.0)));
}

#[test]
fn json_store_restores_volume_and_playlist_without_playing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let mut seed = JsonSettingsStore::open(&path);
    seed.set_volume(55.0);
    seed.set_playlist(&playlist(&["a.mp3", "b.mp3"]));

    let clock = ManualClock::new();
    let library = library();
    let mut rt = runtime(&clock, &library).with_store(Box::new(JsonSettingsStore::open(&path)));

    let view = rt.snapshot();
    assert_eq!(view.volume, 55.0);
    assert_eq!(view.playlist.len(), 2);
    assert_eq!(view.state, PlaybackState::Stopped);
    assert_eq!(library.open_count("a.mp3"), 0);

    rt.execute(Command::SetVolume(20.0)).expect("volume");
    rt.execute(Command::SetPlaylist(playlist(&["c.mp3"])))
        .expect("playlist");
    let reopened = JsonSettingsStore::open(&path);
    assert_eq!(reopened.volume(), Some(20.0));
    assert_eq!(reopened.playlist(), Some(playlist(&["c.mp3"])));
}

#[test]
fn submitting_to_a_dropped_runtime_is_disconnected() {
    let clock = ManualClock::new();
    let library = library();
    let handle = runtime(&clock, &library).handle();
    assert_eq!(
        handle.submit(Command::Play).wait(),
        Err(cueline_lib::PlayerError::Disconnected)
    );
}
