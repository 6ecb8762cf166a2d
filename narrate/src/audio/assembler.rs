//! Lossless concatenation of a run's segments using FFmpeg.

use crate::error::{NarrateError, Result};
use crate::layout::RunLayout;
use std::path::{Path, PathBuf};
use std::process::Command;

/// External tool that joins the files listed in a concat manifest.
pub trait ConcatTool: Send + Sync {
    /// Stream-copy the manifest's files, in order, into `output`.
    fn concat(&self, manifest: &Path, output: &Path) -> Result<()>;

    /// Tool name for display
    fn name(&self) -> &str;
}

/// FFmpeg's concat demuxer with `-c copy`.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the configured executable, or find `ffmpeg` on PATH.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        if let Some(path) = configured {
            if !path.exists() {
                return Err(NarrateError::Config(format!(
                    "ffmpeg_path does not exist: {}",
                    path.display()
                )));
            }
            return Ok(Self::new(path));
        }

        which::which("ffmpeg").map(Self::new).map_err(|_| {
            NarrateError::Config(
                "ffmpeg not found on PATH. Install FFmpeg or set ffmpeg_path in the config."
                    .into(),
            )
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ConcatTool for Ffmpeg {
    fn concat(&self, manifest: &Path, output: &Path) -> Result<()> {
        log::debug!(
            "{} -f concat -safe 0 -i {} -c copy {}",
            self.program.display(),
            manifest.display(),
            output.display()
        );

        let result = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .output()?;

        if !result.status.success() {
            return Err(NarrateError::concat_failed(result.status, &result.stderr));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Names of this run's segment files, sorted.
pub fn list_segments(layout: &RunLayout) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(layout.dir())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if layout.is_segment_name(&name) {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// Check that `names` are exactly ordinals `1..=expected`.
fn verify_ordinals(layout: &RunLayout, names: &[String], expected: usize) -> Result<()> {
    let mismatch = NarrateError::SegmentMismatch {
        expected,
        found: names.len(),
    };

    if names.len() != expected {
        return Err(mismatch);
    }

    for (i, name) in names.iter().enumerate() {
        if layout.parse_ordinal(name) != Some(i + 1) {
            return Err(mismatch);
        }
    }

    Ok(())
}

/// Render a concat demuxer file list.
pub fn manifest_content(names: &[String]) -> String {
    let mut content = String::new();
    for name in names {
        // Escape single quotes for the concat demuxer
        let escaped = name.replace('\'', "'\\''");
        content.push_str(&format!("file '{}'\n", escaped));
    }
    content
}

/// Write the manifest listing `names` in order.
pub fn write_manifest(layout: &RunLayout, names: &[String]) -> Result<PathBuf> {
    let path = layout.manifest_path();
    std::fs::write(&path, manifest_content(names))?;
    Ok(path)
}

/// Concatenate the run's `expected` segments into the output file.
///
/// Segments are taken in lexicographic order, which the zero-padded
/// ordinals make equal to synthesis order. The tool writes to the run's
/// staging path and the result replaces `<base>.<ext>` only once the tool
/// has succeeded and actually produced it, so a failed run never leaves an
/// output behind and never disturbs one from an earlier run. On failure the
/// segments and the manifest stay on disk.
pub fn concatenate(layout: &RunLayout, expected: usize, tool: &dyn ConcatTool) -> Result<PathBuf> {
    let names = list_segments(layout)?;
    verify_ordinals(layout, &names, expected)?;

    let manifest = write_manifest(layout, &names)?;
    let staging = layout.staging_output_path();
    let output = layout.output_path();

    log::info!(
        "Concatenating {} segments into {} with {}",
        names.len(),
        output.display(),
        tool.name()
    );
    if let Err(e) = tool.concat(&manifest, &staging) {
        discard_partial(&staging);
        return Err(e);
    }

    if !staging.is_file() {
        return Err(NarrateError::MissingOutput(output));
    }
    std::fs::rename(&staging, &output)?;

    Ok(output)
}

/// Remove whatever a failed tool run left at `path`.
fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Could not remove partial output {}: {}", path.display(), e);
        }
    }
}
