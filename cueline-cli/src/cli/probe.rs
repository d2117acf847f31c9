//! `cue probe`: header summary without playback.

use std::path::Path;

use log::{error, info};

use cueline_lib::audio::probe::{probe_file, ProbeSummary};

/// Probe every file, printing one line each. Returns the process exit code.
pub fn run_probe<'a>(files: impl IntoIterator<Item = &'a String>) -> i32 {
    let mut code = 0;
    for file in files {
        match probe_file(Path::new(file)) {
            Ok(summary) => {
                info!("probed {}", file);
                println!("{}", describe(file, &summary));
            }
            Err(err) => {
                error!("probe failed for {}: {}", file, err);
                eprintln!("{}: {}", file, err);
                code = -1;
            }
        }
    }
    code
}

fn describe(file: &str, summary: &ProbeSummary) -> String {
    let sample_rate = summary
        .sample_rate
        .map(|rate| format!("{} Hz", rate))
        .unwrap_or_else(|| "? Hz".to_string());
    let channels = summary
        .channels
        .map(|count| count.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{}: codec={} sample_rate={} channels={} duration={:.3}s",
        file, summary.codec, sample_rate, channels, summary.duration_seconds
    )
}
