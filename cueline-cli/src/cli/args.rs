//! CLI argument definitions for `cue`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("cue")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play audio files as a playlist")
        .arg_required_else_help(true)
        .args_conflicts_with_subcommands(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Path to a JSON settings file"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("PERCENT")
                .value_parser(value_parser!(f64))
                .help("Playback volume (0-100); overrides the stored volume"),
        )
        .arg(
            Arg::new("seek")
                .long("seek")
                .short('s')
                .value_name("TIME")
                .value_parser(value_parser!(f64))
                .help("Start the first track at the given time in seconds"),
        )
        .arg(
            Arg::new("max-attempts")
                .long("max-attempts")
                .value_name("COUNT")
                .value_parser(value_parser!(u32))
                .help("Attempts to start the next track before giving up"),
        )
        .arg(
            Arg::new("retry-delay-ms")
                .long("retry-delay-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Delay between start attempts"),
        )
        .arg(
            Arg::new("no-auto-advance")
                .long("no-auto-advance")
                .action(ArgAction::SetTrue)
                .help("Stop after each track instead of advancing"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_name("PATH")
                .help("JSON file remembering volume and playlist between runs"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not draw the terminal UI"),
        )
        .arg(
            Arg::new("FILES")
                .help("Audio files to play, in order")
                .num_args(1..)
                .index(1),
        )
        .subcommand(
            Command::new("probe")
                .about("Print codec, sample rate, channels and duration of each file")
                .arg(
                    Arg::new("FILES")
                        .help("Audio files to probe")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand_required(true)
                .subcommand(
                    Command::new("settings-json").about("Print the default player settings"),
                ),
        )
}
