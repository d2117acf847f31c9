//! # Cue
//!
//! A terminal playlist player built on `cueline-lib`.

use log::error;

mod cli;
mod controls;
mod logging;
mod runner;
mod ui;

fn main() {
    let log_buffer = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            eprintln!("cue: {}", err);
            -1
        }
    };

    std::process::exit(code)
}
