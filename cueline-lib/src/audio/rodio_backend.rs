//! Output through the default device using rodio.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rodio::decoder::DecoderError;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::audio::probe::probe_file;
use crate::audio::{clamp_seek_target, AudioBackend, AudioResource, OpenRequest};
use crate::error::{OpenError, SeekError};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 5;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

/// Backend owning the default output stream.
///
/// Each opened resource gets its own sink connected to the stream's mixer.
pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    /// Open the default output stream, retrying a few times while the device
    /// comes up.
    pub fn open_default() -> Result<Self, OpenError> {
        let mut attempt = 1;
        loop {
            match OutputStreamBuilder::open_default_stream() {
                Ok(stream) => return Ok(Self { stream }),
                Err(err) if attempt < OUTPUT_STREAM_OPEN_RETRIES => {
                    warn!(
                        "open_default_stream attempt {}/{} failed: {}",
                        attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    attempt += 1;
                    thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
                }
                Err(err) => {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return Err(OpenError::Device(err.to_string()));
                }
            }
        }
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, request: OpenRequest) -> Result<Box<dyn AudioResource>, OpenError> {
        let OpenRequest {
            path,
            end_buffer,
            volume,
            notifier,
        } = request;

        let summary = probe_file(&path)?;
        let decoder = open_decoder(&path)?;
        let duration = resolve_duration(&path, summary.duration_seconds, decoder.total_duration());

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.set_volume(volume);
        sink.append(decoder);
        sink.append(EmptyCallback::new(Box::new(move || notifier.finished())));

        debug!(
            "opened {} ({}, {:.3}s)",
            path.display(),
            summary.codec,
            duration
        );

        Ok(Box::new(RodioResource {
            sink: Some(sink),
            duration,
            end_buffer,
            path: path.display().to_string(),
        }))
    }
}

/// Header duration, falling back to the decoder's estimate.
///
/// Stays 0 when neither knows it; seeks on such a file clamp to the start.
fn resolve_duration(path: &Path, probed: f64, decoded: Option<Duration>) -> f64 {
    if probed > 0.0 {
        return probed;
    }
    match decoded.map(|d| d.as_secs_f64()).filter(|d| *d > 0.0) {
        Some(seconds) => seconds,
        None => {
            warn!("{}: duration unknown, seeking disabled", path.display());
            0.0
        }
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, OpenError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => OpenError::NotFound(display.clone()),
        _ => OpenError::Corrupt(format!("{}: {}", display, err)),
    })?;

    Decoder::new(BufReader::new(file)).map_err(|err| match err {
        DecoderError::UnrecognizedFormat => {
            OpenError::UnsupportedFormat(format!("{}: unrecognized format", display))
        }
        other => OpenError::Corrupt(format!("{}: {}", display, other)),
    })
}

/// A file playing through one rodio sink.
pub struct RodioResource {
    sink: Option<Sink>,
    duration: f64,
    end_buffer: f64,
    path: String,
}

impl AudioResource for RodioResource {
    fn current_position(&self) -> f64 {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn total_duration(&self) -> f64 {
        self.duration
    }

    fn seek(&mut self, seconds: f64) -> Result<(), SeekError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| SeekError::Failed(format!("{} is closed", self.path)))?;
        if !Path::new(&self.path).exists() {
            return Err(SeekError::NotFound(self.path.clone()));
        }

        let target = clamp_seek_target(seconds, self.duration, self.end_buffer);
        sink.try_seek(Duration::from_secs_f64(target))
            .map_err(|err| SeekError::Failed(err.to_string()))
    }

    fn set_volume(&mut self, level: f32) {
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(level.clamp(0.0, 1.0));
        }
    }

    fn play(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
    }

    fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("closed {}", self.path);
        }
    }

    fn is_closed(&self) -> bool {
        self.sink.is_none()
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_duration_wins_over_the_decoder_estimate() {
        let path = Path::new("a.flac");
        assert_eq!(resolve_duration(path, 2.0, Some(Duration::from_secs(3))), 2.0);
        assert_eq!(resolve_duration(path, 0.0, Some(Duration::from_secs(3))), 3.0);
    }

    #[test]
    fn unknown_duration_stays_zero() {
        let path = Path::new("stream.mp3");
        assert_eq!(resolve_duration(path, 0.0, None), 0.0);
        assert_eq!(resolve_duration(path, 0.0, Some(Duration::ZERO)), 0.0);
    }
}
