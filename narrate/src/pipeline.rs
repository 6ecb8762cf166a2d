//! The narration pipeline: chunk, synthesize in order, concatenate, clean up.

use crate::audio::probe::{self, DEFAULT_TOLERANCE_MS, DurationReport};
use crate::audio::{ConcatTool, cleanup, concatenate, write_segment};
use crate::config::NarrateConfig;
use crate::error::{NarrateError, Result};
use crate::layout::RunLayout;
use crate::progress::Spinner;
use crate::text::{TextChunk, TokenCounter, chunk_lines, read_lines};
use std::fmt;
use std::path::{Path, PathBuf};
use tts_client::{AudioFormat, RetryPolicy, SpeechProvider, SpeechRequest, synthesize_with_retry};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub voice: String,
    pub model: String,
    pub format: AudioFormat,
    /// Soft token budget per chunk
    pub token_budget: usize,
    /// Hard character ceiling per chunk
    pub max_chunk_chars: usize,
    pub retry: RetryPolicy,
    /// Skip cleanup after a successful concatenation
    pub keep_segments: bool,
    pub verify_duration: bool,
    /// Print per-chunk progress and the spinner
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &NarrateConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            model: config.model.clone(),
            format: config.format,
            token_budget: config.token_budget,
            max_chunk_chars: config.max_chunk_chars,
            retry: RetryPolicy::with_attempts(config.max_attempts),
            keep_segments: false,
            verify_duration: config.verify_duration,
            show_progress: true,
        }
    }
}

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Chunked { chunks: usize },
    Synthesizing { ordinal: usize, total: usize },
    Concatenating,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Chunked { chunks } => write!(f, "chunked ({} chunks)", chunks),
            Self::Synthesizing { ordinal, total } => {
                write!(f, "synthesizing ({}/{})", ordinal, total)
            }
            Self::Concatenating => write!(f, "concatenating"),
            Self::CleaningUp => write!(f, "cleaning up"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub chunks: usize,
    /// Intermediate files removed by cleanup
    pub removed: usize,
    pub durations: Option<DurationReport>,
}

/// Turns one text file into one audio file.
///
/// Collaborators are injected so runs can be driven by test doubles.
pub struct Pipeline<'a> {
    provider: &'a dyn SpeechProvider,
    counter: &'a dyn TokenCounter,
    concat: &'a dyn ConcatTool,
    ffprobe: Option<PathBuf>,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        provider: &'a dyn SpeechProvider,
        counter: &'a dyn TokenCounter,
        concat: &'a dyn ConcatTool,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            counter,
            concat,
            ffprobe: None,
            options,
        }
    }

    /// ffprobe used when duration verification is on.
    pub fn with_ffprobe(mut self, ffprobe: Option<PathBuf>) -> Self {
        self.ffprobe = ffprobe;
        self
    }

    /// Run the whole conversion for `input` into `layout`.
    ///
    /// Any failure leaves what was already written on disk.
    pub async fn run(&self, input: &Path, layout: &RunLayout) -> Result<RunSummary> {
        let mut state = RunState::Start;
        let result = self.execute(input, layout, &mut state).await;

        if let Err(e) = &result {
            log::debug!("Run failed while {}: {}", state, e);
            enter(&mut state, RunState::Failed);
        }

        result
    }

    async fn execute(
        &self,
        input: &Path,
        layout: &RunLayout,
        state: &mut RunState,
    ) -> Result<RunSummary> {
        let lines = read_lines(input)?;
        let chunks = self.prepare_chunks(&lines)?;
        if chunks.is_empty() {
            return Err(NarrateError::EmptyInput(input.to_path_buf()));
        }
        enter(
            state,
            RunState::Chunked {
                chunks: chunks.len(),
            },
        );

        let leftovers = layout.existing_run_files()?;
        if !leftovers.is_empty() {
            log::debug!("Files from an earlier run: {:?}", leftovers);
            return Err(NarrateError::RunCollision {
                dir: layout.dir().to_path_buf(),
                stamp: layout.stamp().to_string(),
                found: leftovers.len(),
            });
        }

        layout.prepare()?;
        let segments = self.synthesize_all(&chunks, layout, state).await?;

        enter(state, RunState::Concatenating);
        if self.options.show_progress {
            eprintln!(
                "Chunk files are in {}, combining with {}...",
                layout.dir().display(),
                self.concat.name()
            );
        }
        let output = concatenate(layout, chunks.len(), self.concat)?;
        let durations = self.check_durations(&segments, &output);

        let removed = if self.options.keep_segments {
            0
        } else {
            enter(state, RunState::CleaningUp);
            cleanup(layout)?
        };

        enter(state, RunState::Done);
        Ok(RunSummary {
            output,
            chunks: chunks.len(),
            removed,
            durations,
        })
    }

    /// Chunk `lines` and check every chunk against the character ceiling.
    ///
    /// Runs before anything is synthesized, so an oversized chunk costs no
    /// API calls and writes no files.
    pub fn prepare_chunks(&self, lines: &[String]) -> Result<Vec<TextChunk>> {
        let chunks = chunk_lines(lines, self.counter, self.options.token_budget)?;
        for chunk in &chunks {
            chunk.check_length(self.options.max_chunk_chars)?;
        }
        log::debug!(
            "{} lines -> {} chunks (budget {} tokens, {})",
            lines.len(),
            chunks.len(),
            self.options.token_budget,
            self.counter.describe()
        );
        Ok(chunks)
    }

    async fn synthesize_all(
        &self,
        chunks: &[TextChunk],
        layout: &RunLayout,
        state: &mut RunState,
    ) -> Result<Vec<PathBuf>> {
        let total = chunks.len();
        let mut segments = Vec::with_capacity(total);

        for chunk in chunks {
            enter(
                state,
                RunState::Synthesizing {
                    ordinal: chunk.ordinal,
                    total,
                },
            );
            segments.push(self.synthesize_chunk(chunk, total, layout).await?);
        }

        Ok(segments)
    }

    async fn synthesize_chunk(
        &self,
        chunk: &TextChunk,
        total: usize,
        layout: &RunLayout,
    ) -> Result<PathBuf> {
        chunk.check_length(self.options.max_chunk_chars)?;

        let spinner = if self.options.show_progress {
            eprintln!("Chunk {:06} of {}", chunk.ordinal, total);
            eprintln!("  Input: {}...", chunk.preview());
            Spinner::start(format!("Synthesizing with {}", self.provider.name()))
        } else {
            Spinner::hidden()
        };

        let request = SpeechRequest::new(
            chunk.text(),
            &self.options.voice,
            &self.options.model,
            self.options.format,
        );
        let response = match synthesize_with_retry(self.provider, &request, &self.options.retry).await {
            Ok(response) => {
                spinner.finish(format!("Chunk {:06} synthesized", chunk.ordinal)).await;
                response
            }
            Err(source) => {
                spinner.clear().await;
                return Err(NarrateError::Synthesis {
                    ordinal: chunk.ordinal,
                    source,
                });
            }
        };

        let path = write_segment(layout, chunk.ordinal, &response.audio)?;
        log::info!(
            "Chunk {}/{}: {} bytes -> {}",
            chunk.ordinal,
            total,
            response.audio.len(),
            path.display()
        );
        if self.options.show_progress {
            eprintln!("  Saved {}", path.display());
        }

        Ok(path)
    }

    fn check_durations(&self, segments: &[PathBuf], output: &Path) -> Option<DurationReport> {
        if !self.options.verify_duration {
            return None;
        }
        let Some(ffprobe) = &self.ffprobe else {
            log::warn!("Duration check skipped: ffprobe not found");
            return None;
        };

        match probe::compare_durations(ffprobe, segments, output) {
            Ok(report) => {
                if !report.within(DEFAULT_TOLERANCE_MS) {
                    log::warn!(
                        "Output is {} ms but segments sum to {} ms",
                        report.output_ms,
                        report.segments_ms
                    );
                }
                Some(report)
            }
            Err(e) => {
                log::warn!("Duration check skipped: {}", e);
                None
            }
        }
    }
}

fn enter(state: &mut RunState, next: RunState) {
    log::debug!("Run state: {} -> {}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::assembler::fakes::{ByteConcat, FailingConcat, SilentConcat};
    use crate::text::tokenizer::WhitespaceCounter;
    use std::time::Duration;
    use tempfile::TempDir;
    use tts_client::{MockProvider, TtsError};

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        layout: RunLayout,
    }

    fn fixture(content: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("story.txt");
        std::fs::write(&input, content).unwrap();
        let layout = RunLayout::new(
            dir.path().join("story"),
            "story",
            "202401010000",
            AudioFormat::Mp3,
        );
        Fixture {
            _dir: dir,
            input,
            layout,
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            voice: "onyx".to_string(),
            model: "tts-1".to_string(),
            format: AudioFormat::Mp3,
            token_budget: 500,
            max_chunk_chars: 4000,
            retry: RetryPolicy {
                max_attempts: 1,
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                backoff_factor: 2.0,
            },
            keep_segments: false,
            verify_duration: false,
            show_progress: false,
        }
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn words(n: usize, tag: &str) -> String {
        (0..n)
            .map(|i| format!("{}{}", tag, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Chunked { chunks: 3 }.to_string(), "chunked (3 chunks)");
        assert_eq!(
            RunState::Synthesizing {
                ordinal: 2,
                total: 3
            }
            .to_string(),
            "synthesizing (2/3)"
        );
    }

    #[tokio::test]
    async fn test_short_input_single_chunk() {
        let fx = fixture("Hello there.\n\nThis is short.\nThe end.\n");
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());

        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();

        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.output, fx.layout.dir().join("story.mp3"));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            provider.requests(),
            vec!["Hello there. This is short. The end."]
        );
        assert_eq!(
            std::fs::read(&summary.output).unwrap(),
            MockProvider::audio_for("Hello there. This is short. The end.")
        );
        assert_eq!(dir_names(fx.layout.dir()), vec!["story.mp3"]);
    }

    #[tokio::test]
    async fn test_long_input_ordered_chunks() {
        // 12 lines x 100 tokens at a 500 budget
        let lines: Vec<String> = (0..12).map(|i| words(100, &format!("l{}w", i))).collect();
        let fx = fixture(&lines.join("\n"));
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());

        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.removed, 4);
        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], lines[0..5].join(" "));
        assert_eq!(requests[1], lines[5..10].join(" "));
        assert_eq!(requests[2], lines[10..12].join(" "));

        let expected: Vec<u8> = requests
            .iter()
            .flat_map(|r| MockProvider::audio_for(r))
            .collect();
        assert_eq!(std::fs::read(&summary.output).unwrap(), expected);
        assert_eq!(dir_names(fx.layout.dir()), vec!["story.mp3"]);
    }

    #[tokio::test]
    async fn test_oversized_chunk_fails_before_synthesis() {
        let fx = fixture(&"x".repeat(5000));
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());

        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        match err {
            NarrateError::ChunkTooLarge {
                ordinal, length, ..
            } => {
                assert_eq!(ordinal, 1);
                assert_eq!(length, 5000);
            }
            other => panic!("expected ChunkTooLarge, got {:?}", other),
        }
        assert_eq!(provider.call_count(), 0);
        assert!(!fx.layout.dir().exists());
    }

    #[tokio::test]
    async fn test_oversized_later_chunk_writes_nothing() {
        let content = format!("short line\n{}\n", "y".repeat(4500));
        let fx = fixture(&content);
        let provider = MockProvider::always_succeeds();
        let mut opts = options();
        opts.token_budget = 1;
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, opts);

        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        assert!(matches!(err, NarrateError::ChunkTooLarge { ordinal: 2, .. }));
        assert_eq!(provider.call_count(), 0);
        assert!(!fx.layout.dir().exists());
    }

    #[tokio::test]
    async fn test_concat_failure_keeps_artifacts() {
        let lines: Vec<String> = (0..6).map(|i| words(100, &format!("l{}w", i))).collect();
        let fx = fixture(&lines.join("\n"));
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &FailingConcat, options());

        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        assert!(matches!(err, NarrateError::ConcatTool { .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(!fx.layout.output_path().exists());
        assert!(fx.layout.manifest_path().exists());
        assert!(fx.layout.segment_path(1).exists());
        assert!(fx.layout.segment_path(2).exists());
    }

    #[tokio::test]
    async fn test_failed_rerun_keeps_previous_output() {
        let fx = fixture("First line.\nSecond line.\n");
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());
        pipeline.run(&fx.input, &fx.layout).await.unwrap();
        let previous = std::fs::read(fx.layout.output_path()).unwrap();

        // Same directory, a later minute
        let later = RunLayout::new(fx.layout.dir(), "story", "202401010001", AudioFormat::Mp3);
        let failing = Pipeline::new(&provider, &WhitespaceCounter, &FailingConcat, options());
        let err = failing.run(&fx.input, &later).await.unwrap_err();
        assert!(matches!(err, NarrateError::ConcatTool { .. }));
        assert_eq!(std::fs::read(later.output_path()).unwrap(), previous);
        assert!(!later.staging_output_path().exists());

        let evening = RunLayout::new(fx.layout.dir(), "story", "202401011900", AudioFormat::Mp3);
        let silent = Pipeline::new(&provider, &WhitespaceCounter, &SilentConcat, options());
        let err = silent.run(&fx.input, &evening).await.unwrap_err();
        assert!(matches!(err, NarrateError::MissingOutput(_)));
        assert_eq!(err.exit_code(), 4);
        assert_eq!(std::fs::read(evening.output_path()).unwrap(), previous);
    }

    #[tokio::test]
    async fn test_rerun_in_same_minute_fails_before_synthesis() {
        let fx = fixture("First line.\nSecond line.\n");
        let provider = MockProvider::always_succeeds();
        let failing = Pipeline::new(&provider, &WhitespaceCounter, &FailingConcat, options());
        failing.run(&fx.input, &fx.layout).await.unwrap_err();
        let kept = dir_names(fx.layout.dir());

        let retry_provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&retry_provider, &WhitespaceCounter, &ByteConcat, options());
        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        match err {
            NarrateError::RunCollision { stamp, found, .. } => {
                assert_eq!(stamp, "202401010000");
                assert_eq!(found, 1);
            }
            other => panic!("expected RunCollision, got {:?}", other),
        }
        assert_eq!(retry_provider.call_count(), 0);
        assert_eq!(dir_names(fx.layout.dir()), kept);
    }

    #[tokio::test]
    async fn test_synthesis_failure_aborts_run() {
        let lines: Vec<String> = (0..12).map(|i| words(100, &format!("l{}w", i))).collect();
        let fx = fixture(&lines.join("\n"));
        let provider = MockProvider::fails_on_call(
            1,
            TtsError::Unauthorized {
                message: "invalid key".into(),
                status_code: 401,
            },
        );
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());

        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        assert!(matches!(err, NarrateError::Synthesis { ordinal: 2, .. }));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(provider.call_count(), 2);
        assert!(fx.layout.segment_path(1).exists());
        assert!(!fx.layout.segment_path(2).exists());
        assert!(!fx.layout.manifest_path().exists());
        assert!(!fx.layout.output_path().exists());
    }

    #[tokio::test]
    async fn test_transient_failure_retried_with_same_ordinal() {
        let lines: Vec<String> = (0..6).map(|i| words(100, &format!("l{}w", i))).collect();
        let fx = fixture(&lines.join("\n"));
        let provider = MockProvider::fails_then_succeeds(1, TtsError::Network("reset".into()));
        let mut opts = options();
        opts.retry.max_attempts = 3;
        opts.keep_segments = true;
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, opts);

        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();

        assert_eq!(summary.chunks, 2);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(
            dir_names(fx.layout.dir()),
            vec![
                "concat.txt",
                "story.mp3",
                "tmp_202401010000_chunk000001.mp3",
                "tmp_202401010000_chunk000002.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_keep_segments_skips_cleanup() {
        let fx = fixture("One.\nTwo.\n");
        let provider = MockProvider::always_succeeds();
        let mut opts = options();
        opts.keep_segments = true;
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, opts);

        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();

        assert_eq!(summary.removed, 0);
        assert!(fx.layout.segment_path(1).exists());
        assert!(fx.layout.manifest_path().exists());
        assert!(summary.output.exists());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fx = fixture("\n   \n\t\n");
        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());

        let err = pipeline.run(&fx.input, &fx.layout).await.unwrap_err();

        assert!(matches!(err, NarrateError::EmptyInput(_)));
        assert_eq!(provider.call_count(), 0);
        assert!(!fx.layout.dir().exists());
    }

    #[tokio::test]
    async fn test_unrelated_files_survive() {
        let fx = fixture("Only line.\n");
        std::fs::create_dir_all(fx.layout.dir()).unwrap();
        let older = fx.layout.dir().join("tmp_202312312359_chunk000001.mp3");
        std::fs::write(&older, b"older").unwrap();
        std::fs::write(fx.layout.dir().join("cover.jpg"), b"jpg").unwrap();

        let provider = MockProvider::always_succeeds();
        let pipeline = Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, options());
        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();

        assert_eq!(
            std::fs::read(&summary.output).unwrap(),
            MockProvider::audio_for("Only line.")
        );
        assert_eq!(
            dir_names(fx.layout.dir()),
            vec!["cover.jpg", "story.mp3", "tmp_202312312359_chunk000001.mp3"]
        );
    }

    #[tokio::test]
    async fn test_verify_duration_without_ffprobe() {
        let fx = fixture("Only line.\n");
        let provider = MockProvider::always_succeeds();
        let mut opts = options();
        opts.verify_duration = true;
        let pipeline =
            Pipeline::new(&provider, &WhitespaceCounter, &ByteConcat, opts).with_ffprobe(None);

        let summary = pipeline.run(&fx.input, &fx.layout).await.unwrap();
        assert!(summary.durations.is_none());
    }

    #[test]
    fn test_options_from_config() {
        let config = NarrateConfig {
            max_attempts: 3,
            token_budget: 250,
            ..NarrateConfig::default()
        };
        let opts = PipelineOptions::from_config(&config);
        assert_eq!(opts.retry.max_attempts, 3);
        assert_eq!(opts.token_budget, 250);
        assert_eq!(opts.max_chunk_chars, 4000);
        assert_eq!(opts.voice, "onyx");
        assert!(opts.show_progress);
        assert!(!opts.keep_segments);
    }
}
