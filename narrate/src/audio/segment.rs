//! Persisting synthesized segments.

use crate::error::Result;
use crate::layout::RunLayout;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Write one segment's audio to its ordinal-named file.
///
/// Fails with `AlreadyExists` rather than overwrite a file.
pub fn write_segment(layout: &RunLayout, ordinal: usize, audio: &[u8]) -> Result<PathBuf> {
    let path = layout.segment_path(ordinal);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    file.write_all(audio)?;
    file.sync_all()?;

    Ok(path)
}
