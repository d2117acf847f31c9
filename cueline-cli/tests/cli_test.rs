use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_tone(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let frames = (22_050.0 * seconds) as u32;
    for n in 0..frames {
        let sample = if (n / 50) % 2 == 0 { 4000 } else { -4000 };
        writer.write_sample(sample as i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn create_settings_json_prints_the_defaults() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cue"))
        .args(["create", "settings-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retry_delay_ms"))
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["retry_delay_ms"], 100);
    assert_eq!(json["max_attempts"], 3);
    assert_eq!(json["auto_advance"], true);
}

#[test]
fn probe_describes_a_wav_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tone.wav");
    write_tone(&path, 1.0);

    Command::new(assert_cmd::cargo::cargo_bin!("cue"))
        .arg("probe")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("sample_rate=22050 Hz"))
        .stdout(predicate::str::contains("channels=1"))
        .stdout(predicate::str::contains("duration=1.000s"));
}

#[test]
fn probe_fails_for_a_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.flac");

    Command::new(assert_cmd::cargo::cargo_bin!("cue"))
        .arg("probe")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn malformed_config_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("settings.json");
    std::fs::write(&config, "{ not json").expect("write config");

    Command::new(assert_cmd::cargo::cargo_bin!("cue"))
        .arg("--config")
        .arg(&config)
        .arg("song.flac")
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings error"));
}
