//! Error taxonomy for a narration run.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;
use tts_client::TtsError;

#[derive(Error, Debug)]
pub enum NarrateError {
    #[error("{0}")]
    Usage(String),

    #[error("No text found in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error(
        "Chunk {ordinal:06}: \"{prefix}...\" is {length} characters, more than the {limit} allowed. Please make it shorter."
    )]
    ChunkTooLarge {
        ordinal: usize,
        length: usize,
        limit: usize,
        prefix: String,
    },

    #[error("Synthesis failed for chunk {ordinal:06}: {source}")]
    Synthesis {
        ordinal: usize,
        #[source]
        source: TtsError,
    },

    #[error(
        "{} already holds {} intermediate file(s) stamped {} from an earlier run. Remove them, or rerun in a minute.",
        .dir.display(),
        .found,
        .stamp
    )]
    RunCollision {
        dir: PathBuf,
        stamp: String,
        found: usize,
    },

    #[error("Expected {expected} segment files but found {found}")]
    SegmentMismatch { expected: usize, found: usize },

    #[error("Concatenation tool failed ({status}): {stderr}")]
    ConcatTool { status: String, stderr: String },

    #[error("Concatenation reported success but {} was not written", .0.display())]
    MissingOutput(PathBuf),

    #[error("ffprobe failed: {0}")]
    Probe(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NarrateError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ChunkTooLarge { .. } => 2,
            Self::Synthesis { .. } => 3,
            Self::ConcatTool { .. } | Self::MissingOutput(_) | Self::SegmentMismatch { .. } => 4,
            _ => 1,
        }
    }

    pub(crate) fn concat_failed(status: ExitStatus, stderr: &[u8]) -> Self {
        Self::ConcatTool {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NarrateError>;
