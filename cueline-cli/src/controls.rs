use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::{debug, warn};

use cueline_lib::{Command, PlaybackState, PlayerHandle, Reply, Snapshot};

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f64 = 5.0;

pub struct StatusSnapshot {
    pub text: String,
    pub playlist: Vec<String>,
    pub current_index: Option<usize>,
}

pub fn status_text(snapshot: &Snapshot) -> StatusSnapshot {
    let state = match &snapshot.state {
        PlaybackState::Playing => "▶ Playing".to_string(),
        PlaybackState::Paused => "⏸ Paused".to_string(),
        PlaybackState::Loading => "… Loading".to_string(),
        PlaybackState::Stopped => "■ Stopped".to_string(),
        PlaybackState::Error(reason) => format!("✖ Error: {}", reason),
    };
    let current = format_time(snapshot.position * 1000.0);
    let total = format_time(snapshot.duration * 1000.0);
    let percent = if snapshot.duration > 0.0 {
        (snapshot.position / snapshot.duration * 100.0).min(100.0)
    } else {
        0.0
    };
    let track = snapshot
        .current_index
        .and_then(|index| snapshot.playlist.get(index))
        .map(|entry| entry.display_name().to_string())
        .or_else(|| snapshot.track.as_ref().map(|track| track.path.clone()))
        .unwrap_or_else(|| "-".to_string());
    let auto_advance = if snapshot.auto_advance { "on" } else { "off" };

    let text = format!(
        "{}   {} / {}   ({:>5.1}%)\nTrack: {}\nVolume: {:.0}% | auto-advance: {}",
        state, current, total, percent, track, snapshot.volume, auto_advance
    );

    StatusSnapshot {
        text,
        playlist: snapshot
            .playlist
            .iter()
            .map(|entry| entry.display_name().to_string())
            .collect(),
        current_index: snapshot.current_index,
    }
}

/// Commands a key press maps to, given the current player view.
pub fn commands_for_key(code: KeyCode, snapshot: &Snapshot) -> Vec<Command> {
    match code {
        KeyCode::Char('q') => vec![Command::Shutdown],
        KeyCode::Char(' ') => {
            if snapshot.state == PlaybackState::Playing {
                vec![Command::Pause]
            } else {
                vec![Command::Play]
            }
        }
        KeyCode::Char('n') => vec![Command::Next],
        KeyCode::Char('p') => vec![Command::Previous],
        KeyCode::Char('s') => vec![Command::Stop],
        KeyCode::Char('a') => vec![Command::SetAutoAdvance(!snapshot.auto_advance)],
        KeyCode::Left => seek_by(snapshot, -SEEK_STEP_SECONDS),
        KeyCode::Right => seek_by(snapshot, SEEK_STEP_SECONDS),
        KeyCode::Char('-') => vec![Command::SetVolume(snapshot.volume - VOLUME_STEP)],
        KeyCode::Char('=') | KeyCode::Char('+') => {
            vec![Command::SetVolume(snapshot.volume + VOLUME_STEP)]
        }
        _ => Vec::new(),
    }
}

fn seek_by(snapshot: &Snapshot, delta: f64) -> Vec<Command> {
    if snapshot.track.is_none() {
        return Vec::new();
    }
    let target = (snapshot.position + delta).clamp(0.0, snapshot.duration.max(0.0));
    vec![
        Command::BeginSeekDrag,
        Command::DragTo(target),
        Command::Seek(target),
        Command::EndSeekDrag,
    ]
}

/// Read keys on a background thread and submit them to the control thread.
///
/// The thread exits after submitting `Shutdown` or once `done` is set.
pub fn spawn_input(handle: PlayerHandle, done: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !done.load(Ordering::Relaxed) {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let snapshot = match handle.submit(Command::Snapshot).wait() {
                Ok(Reply::Snapshot(snapshot)) => snapshot,
                Ok(_) => continue,
                Err(err) => {
                    debug!("input thread stopping: {}", err);
                    break;
                }
            };

            for command in commands_for_key(key.code, &snapshot) {
                let shutdown = command == Command::Shutdown;
                if let Err(err) = handle.submit(command).wait() {
                    warn!("{}", err);
                }
                if shutdown {
                    return;
                }
            }
        }
    })
}

fn format_time(time: f64) -> String {
    let seconds = (time / 1000.0).ceil() as u32;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
