//! Removal of a run's intermediate files.

use crate::error::Result;
use crate::layout::RunLayout;

/// Delete this run's segments and the manifest.
///
/// Only names carrying the run's temp prefix are touched, so the output
/// file, files from other runs and anything else in the directory stay.
/// Returns the number of files removed.
pub fn cleanup(layout: &RunLayout) -> Result<usize> {
    let prefix = layout.temp_prefix();
    let mut removed = 0;

    for entry in std::fs::read_dir(layout.dir())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    let manifest = layout.manifest_path();
    if manifest.exists() {
        std::fs::remove_file(&manifest)?;
        removed += 1;
    }

    log::debug!("Removed {} intermediate files from {}", removed, layout.dir().display());
    Ok(removed)
}
