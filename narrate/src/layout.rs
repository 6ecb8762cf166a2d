//! File naming for one run inside the output directory.

use crate::error::{NarrateError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tts_client::AudioFormat;

/// Run timestamp format embedded in segment names.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Name of the concat manifest.
pub const MANIFEST_NAME: &str = "concat.txt";

/// Width of the zero-padded ordinal in segment names.
const ORDINAL_WIDTH: usize = 6;

/// Where one run keeps its segments, manifest and output.
///
/// Segment names are `tmp_<stamp>_chunk<NNNNNN>.<ext>`, so a plain
/// lexicographic sort of a run's segments is ordinal order.
#[derive(Debug, Clone)]
pub struct RunLayout {
    dir: PathBuf,
    base_name: String,
    stamp: String,
    format: AudioFormat,
}

impl RunLayout {
    pub fn new(dir: impl Into<PathBuf>, base_name: &str, stamp: &str, format: AudioFormat) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.to_string(),
            stamp: stamp.to_string(),
            format,
        }
    }

    /// Layout for an input file: `./<base>/` unless `output_dir` is given.
    pub fn for_input(
        input: &Path,
        output_dir: Option<&Path>,
        format: AudioFormat,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let base_name = input_base_name(input)?;
        let dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".").join(&base_name));
        let stamp = now.format(RUN_STAMP_FORMAT).to_string();
        Ok(Self::new(dir, &base_name, &stamp, format))
    }

    /// Create the output directory if needed.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Prefix shared by every intermediate file of this run.
    fn run_prefix(&self) -> String {
        format!("tmp_{}_", self.stamp)
    }

    /// Prefix shared by every segment of this run.
    pub fn temp_prefix(&self) -> String {
        format!("{}chunk", self.run_prefix())
    }

    pub fn segment_name(&self, ordinal: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            self.temp_prefix(),
            ordinal,
            self.format.extension(),
            width = ORDINAL_WIDTH
        )
    }

    pub fn segment_path(&self, ordinal: usize) -> PathBuf {
        self.dir.join(self.segment_name(ordinal))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_NAME)
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.base_name, self.format.extension()))
    }

    /// Where the concat tool writes before the result is moved to
    /// [`output_path`](Self::output_path).
    pub fn staging_output_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}out.{}",
            self.run_prefix(),
            self.format.extension()
        ))
    }

    /// Intermediate files already carrying this run's stamp, sorted.
    ///
    /// A missing directory has none.
    pub fn existing_run_files(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = self.run_prefix();
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Whether `name` is a segment file of this run.
    pub fn is_segment_name(&self, name: &str) -> bool {
        self.parse_ordinal(name).is_some()
    }

    /// Ordinal encoded in a segment file name of this run.
    pub fn parse_ordinal(&self, name: &str) -> Option<usize> {
        let digits = name
            .strip_prefix(&self.temp_prefix())?
            .strip_suffix(self.format.extension())?
            .strip_suffix('.')?;
        if digits.len() < ORDINAL_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// File name of `input` without directory or extension.
pub fn input_base_name(input: &Path) -> Result<String> {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| NarrateError::Usage(format!("Not a file path: {}", input.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn layout() -> RunLayout {
        RunLayout::new("/out/story", "story", "202311091530", AudioFormat::Mp3)
    }

    #[test]
    fn test_segment_names() {
        let layout = layout();
        assert_eq!(layout.temp_prefix(), "tmp_202311091530_chunk");
        assert_eq!(layout.segment_name(1), "tmp_202311091530_chunk000001.mp3");
        assert_eq!(
            layout.segment_path(42),
            PathBuf::from("/out/story/tmp_202311091530_chunk000042.mp3")
        );
    }

    #[test]
    fn test_segment_names_sort_in_ordinal_order() {
        let layout = layout();
        let mut names: Vec<String> = [10, 2, 100, 1, 9].iter().map(|n| layout.segment_name(*n)).collect();
        names.sort();
        let ordinals: Vec<usize> = names.iter().filter_map(|n| layout.parse_ordinal(n)).collect();
        assert_eq!(ordinals, vec![1, 2, 9, 10, 100]);
    }

    #[test]
    fn test_manifest_and_output_paths() {
        let layout = layout();
        assert_eq!(layout.manifest_path(), PathBuf::from("/out/story/concat.txt"));
        assert_eq!(layout.output_path(), PathBuf::from("/out/story/story.mp3"));
    }

    #[test]
    fn test_staging_output_is_not_a_segment() {
        let layout = layout();
        let staging = layout.staging_output_path();
        assert_eq!(staging, PathBuf::from("/out/story/tmp_202311091530_out.mp3"));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(!layout.is_segment_name(&name));
    }

    #[test]
    fn test_existing_run_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path().join("story"), "story", "202311091530", AudioFormat::Mp3);
        assert!(layout.existing_run_files().unwrap().is_empty());

        layout.prepare().unwrap();
        std::fs::write(layout.segment_path(2), b"b").unwrap();
        std::fs::write(layout.staging_output_path(), b"partial").unwrap();
        std::fs::write(layout.output_path(), b"final").unwrap();
        std::fs::write(layout.dir().join("tmp_202311091529_chunk000001.mp3"), b"older").unwrap();

        assert_eq!(
            layout.existing_run_files().unwrap(),
            vec!["tmp_202311091530_chunk000002.mp3", "tmp_202311091530_out.mp3"]
        );
    }

    #[test]
    fn test_parse_ordinal() {
        let layout = layout();
        assert_eq!(layout.parse_ordinal("tmp_202311091530_chunk000007.mp3"), Some(7));
        assert_eq!(layout.parse_ordinal("tmp_202311091530_chunk000007.wav"), None);
        assert_eq!(layout.parse_ordinal("tmp_202311091529_chunk000007.mp3"), None);
        assert_eq!(layout.parse_ordinal("tmp_202311091530_chunk7.mp3"), None);
        assert_eq!(layout.parse_ordinal("story.mp3"), None);
        assert_eq!(layout.parse_ordinal("concat.txt"), None);
    }

    #[test]
    fn test_for_input() {
        let now = Local.with_ymd_and_hms(2023, 11, 9, 8, 5, 59).unwrap();
        let layout =
            RunLayout::for_input(Path::new("texts/chapter1.txt"), None, AudioFormat::Mp3, now)
                .unwrap();
        assert_eq!(layout.base_name(), "chapter1");
        assert_eq!(layout.dir(), Path::new("./chapter1"));
        assert_eq!(layout.segment_name(1), "tmp_202311090805_chunk000001.mp3");
        assert_eq!(layout.output_path(), PathBuf::from("./chapter1/chapter1.mp3"));
    }

    #[test]
    fn test_for_input_with_output_dir() {
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let layout = RunLayout::for_input(
            Path::new("notes.md"),
            Some(Path::new("/tmp/audio")),
            AudioFormat::Opus,
            now,
        )
        .unwrap();
        assert_eq!(layout.output_path(), PathBuf::from("/tmp/audio/notes.opus"));
    }

    #[test]
    fn test_input_base_name_rejects_empty() {
        assert!(input_base_name(Path::new("/")).is_err());
        assert_eq!(input_base_name(Path::new("a/b/c.txt")).unwrap(), "c");
    }
}
