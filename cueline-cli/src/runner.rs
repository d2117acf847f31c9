use std::{
    io,
    path::Path,
    sync::{atomic::AtomicBool, atomic::Ordering, Arc},
    time::Duration,
};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};

use cueline_lib::audio::RodioBackend;
use cueline_lib::timer::SystemClock;
use cueline_lib::{
    Command, JsonSettingsStore, PlayerError, PlayerEvent, PlayerSettings, Result, Runtime,
    TrackRef,
};

use crate::logging::{self, LogBuffer};
use crate::{cli, controls, ui};

const FRAME: Duration = Duration::from_millis(50);

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32> {
    info!("Starting cue");
    match args.subcommand() {
        Some(("probe", sub)) => {
            let files = sub.get_many::<String>("FILES").into_iter().flatten();
            return Ok(cli::probe::run_probe(files));
        }
        Some(("create", sub)) => return run_create(sub),
        _ => {}
    }

    let files: Vec<TrackRef> = args
        .get_many::<String>("FILES")
        .into_iter()
        .flatten()
        .map(|file| TrackRef::new(file.as_str()))
        .collect();
    if files.is_empty() {
        error!("no input files");
        return Ok(-1);
    }

    let settings = load_settings(args)?;
    play(args, settings, files, log_buffer)
}

fn run_create(args: &ArgMatches) -> Result<i32> {
    match args.subcommand() {
        Some(("settings-json", _)) => {
            println!("{}", PlayerSettings::default().to_json_pretty()?);
            Ok(0)
        }
        _ => Err(PlayerError::InvalidOperation(
            "unknown create target".to_string(),
        )),
    }
}

/// Settings file (if any) with command-line overrides applied.
fn load_settings(args: &ArgMatches) -> Result<PlayerSettings> {
    let mut settings = match args.get_one::<String>("config") {
        Some(path) => PlayerSettings::from_file(Path::new(path))?,
        None => PlayerSettings::default(),
    };
    if let Some(attempts) = args.get_one::<u32>("max-attempts") {
        settings.max_attempts = *attempts;
    }
    if let Some(delay) = args.get_one::<u64>("retry-delay-ms") {
        settings.retry_delay_ms = *delay;
    }
    if args.get_flag("no-auto-advance") {
        settings.auto_advance = false;
    }
    Ok(settings.normalized())
}

fn play(
    args: &ArgMatches,
    settings: PlayerSettings,
    files: Vec<TrackRef>,
    log_buffer: LogBuffer,
) -> Result<i32> {
    let quiet = args.get_flag("quiet");
    let backend = RodioBackend::open_default()?;
    let mut runtime = Runtime::new(Box::new(backend), &settings, Arc::new(SystemClock));
    if let Some(path) = args.get_one::<String>("state") {
        runtime = runtime.with_store(Box::new(JsonSettingsStore::open(path)));
    }
    let events = runtime.subscribe();

    runtime.execute(Command::SetPlaylist(files))?;
    if let Some(volume) = args.get_one::<f64>("volume") {
        runtime.execute(Command::SetVolume(*volume))?;
    }
    if let Err(err) = runtime.execute(Command::Select(0)) {
        warn!("first track failed to start: {}", err);
    }
    if let Some(seek) = args.get_one::<f64>("seek") {
        runtime.execute(Command::Seek(*seek))?;
    }

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };

    let done = Arc::new(AtomicBool::new(false));
    let input = controls::spawn_input(runtime.handle(), done.clone());

    // The main thread is the control thread from here on.
    while runtime.run_for(FRAME) {
        let finished = events.drain().into_iter().any(|event| {
            matches!(event, PlayerEvent::PlaylistEnded | PlayerEvent::PlaybackFailed(_))
        });
        if finished {
            info!("nothing left to play");
            break;
        }

        if let Some(term) = terminal.as_mut() {
            let status = controls::status_text(&runtime.snapshot());
            let log_lines = logging::snapshot(&log_buffer);
            ui::draw_status(term, &status, &log_lines);
        }
    }

    if runtime.is_running() {
        runtime.execute(Command::Shutdown)?;
    }
    done.store(true, Ordering::Relaxed);
    if input.join().is_err() {
        warn!("input thread panicked");
    }

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
