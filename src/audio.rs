//! Output file naming and playback duration.

use crate::engine::Engine;
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

/// Shortest duration ever reported for a successful synthesis.
const MIN_DURATION_SECS: f64 = 0.1;

/// `tts_<engine>_<timestamp>_<uuid>.<ext>`; unique across concurrent requests.
pub fn output_file_name(engine: Engine, extension: &str) -> String {
    format!(
        "tts_{}_{}_{}.{}",
        engine,
        Utc::now().format("%Y%m%d_%H%M%S"),
        Uuid::new_v4().simple(),
        extension
    )
}

/// Reads the playback length from a WAV header.
///
/// Streamed WAV responses sometimes carry a bogus data length, so the frame
/// count is capped by what the file size can actually hold.
pub fn wav_duration(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return None;
    }

    let frame_bytes = u64::from(spec.channels) * u64::from(spec.bits_per_sample).div_ceil(8);
    let file_len = std::fs::metadata(path).ok()?.len();
    let max_frames = file_len.saturating_sub(44) / frame_bytes.max(1);
    let frames = u64::from(reader.duration()).min(max_frames);

    let secs = frames as f64 / f64::from(spec.sample_rate);
    (secs > 0.0).then_some(secs)
}

/// Rough duration from word count at the requested rate (words per minute).
pub fn estimate_duration(text: &str, rate_wpm: f32) -> f64 {
    let words = text.split_whitespace().count().max(1) as f64;
    let rate = if rate_wpm.is_finite() && rate_wpm > 0.0 {
        f64::from(rate_wpm)
    } else {
        f64::from(crate::engine::DEFAULT_RATE)
    };
    (words / rate * 60.0).max(MIN_DURATION_SECS)
}

/// Engine-reported duration first, then the WAV header, then an estimate.
pub fn resolve_duration(reported: Option<f64>, path: &Path, text: &str, rate_wpm: f32) -> f64 {
    reported
        .filter(|d| d.is_finite() && *d > 0.0)
        .or_else(|| wav_duration(path))
        .unwrap_or_else(|| estimate_duration(text, rate_wpm))
}
