//! Duration checks with FFprobe.

use crate::error::{NarrateError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Allowed difference between the output and the sum of its segments.
pub const DEFAULT_TOLERANCE_MS: u64 = 250;

/// Find ffprobe next to the ffmpeg in use, falling back to PATH.
pub fn locate_ffprobe(ffmpeg: &Path) -> Option<PathBuf> {
    let sibling = ffmpeg.with_file_name(if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" });
    if sibling.exists() {
        return Some(sibling);
    }
    which::which("ffprobe").ok()
}

/// Get duration of an audio file in milliseconds using ffprobe.
pub fn get_audio_duration_ms(ffprobe: &Path, audio_path: &Path) -> Result<u64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(audio_path)
        .output()?;

    if !output.status.success() {
        return Err(NarrateError::Probe(format!(
            "could not read {} ({})",
            audio_path.display(),
            output.status
        )));
    }

    parse_duration_ms(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        NarrateError::Probe(format!("no duration for {}", audio_path.display()))
    })
}

fn parse_duration_ms(stdout: &str) -> Option<u64> {
    let secs: f64 = stdout.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

/// Segment durations compared with the concatenated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationReport {
    pub segments_ms: u64,
    pub output_ms: u64,
}

impl DurationReport {
    pub fn difference_ms(&self) -> u64 {
        self.segments_ms.abs_diff(self.output_ms)
    }

    pub fn within(&self, tolerance_ms: u64) -> bool {
        self.difference_ms() <= tolerance_ms
    }
}

/// Probe every segment and the output.
pub fn compare_durations(
    ffprobe: &Path,
    segments: &[PathBuf],
    output: &Path,
) -> Result<DurationReport> {
    let mut segments_ms = 0;
    for segment in segments {
        segments_ms += get_audio_duration_ms(ffprobe, segment)?;
    }
    let output_ms = get_audio_duration_ms(ffprobe, output)?;

    Ok(DurationReport {
        segments_ms,
        output_ms,
    })
}
