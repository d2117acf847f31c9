//! Symphonia helpers for validating audio files and reading their duration.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::OpenError;

/// Header summary of a playable file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSummary {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    /// Duration in seconds, 0 when the container does not declare one.
    pub duration_seconds: f64,
}

/// Probe a file's headers and confirm a decoder exists for its first audio track.
pub fn probe_file(path: &Path) -> Result<ProbeSummary, OpenError> {
    let display = path.display().to_string();
    let src = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => OpenError::NotFound(display.clone()),
        _ => OpenError::Corrupt(format!("{}: {}", display, err)),
    })?;

    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|err| map_symphonia_error(&display, err))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| OpenError::UnsupportedFormat(format!("{}: no audio tracks", display)))?;
    let params = &track.codec_params;

    let codecs = symphonia::default::get_codecs();
    codecs
        .make(params, &DecoderOptions::default())
        .map_err(|err| map_symphonia_error(&display, err))?;

    let codec = codecs
        .get_codec(params.codec)
        .map(|descriptor| descriptor.short_name.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(ProbeSummary {
        codec,
        sample_rate: params.sample_rate,
        channels: params.channels.map(|channels| channels.count()),
        duration_seconds: duration_from_frames(params).unwrap_or(0.0),
    })
}

/// Duration derived from the frame count and time base, when both are known.
pub fn duration_from_frames(codec_params: &CodecParameters) -> Option<f64> {
    let time_base = codec_params.time_base?;
    let frames = codec_params.n_frames?;
    let time = time_base.calc_time(frames);
    Some(time.seconds as f64 + time.frac)
}

fn map_symphonia_error(path: &str, err: SymphoniaError) -> OpenError {
    match err {
        SymphoniaError::IoError(io) if io.kind() == ErrorKind::NotFound => {
            OpenError::NotFound(path.to_string())
        }
        SymphoniaError::Unsupported(what) => {
            OpenError::UnsupportedFormat(format!("{}: {}", path, what))
        }
        other => OpenError::Corrupt(format!("{}: {}", path, other)),
    }
}
