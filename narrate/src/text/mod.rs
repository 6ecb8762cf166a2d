//! Text processing module: line reading, token counting and chunking.

pub mod chunker;
pub mod tokenizer;

pub use chunker::chunk_lines;
pub use tokenizer::{TokenCounter, counter_from_spec};

use crate::error::{NarrateError, Result};
use std::path::Path;

/// Number of characters shown when a chunk is previewed on the console.
pub const PREVIEW_CHARS: usize = 60;

/// A group of consecutive input lines synthesized as one audio segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 1-based position in the run
    pub ordinal: usize,
    /// Trimmed, non-empty lines in input order
    pub lines: Vec<String>,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(ordinal: usize, lines: Vec<String>) -> Self {
        Self { ordinal, lines }
    }

    /// The lines joined by single spaces, as sent to the provider.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Length of the chunk string in characters.
    pub fn char_len(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).sum::<usize>()
            + self.lines.len().saturating_sub(1)
    }

    /// The first `PREVIEW_CHARS` characters of the chunk string.
    pub fn preview(&self) -> String {
        self.text().chars().take(PREVIEW_CHARS).collect()
    }

    /// Fail if the chunk string is longer than `limit` characters.
    pub fn check_length(&self, limit: usize) -> Result<()> {
        let length = self.char_len();
        if length > limit {
            return Err(NarrateError::ChunkTooLarge {
                ordinal: self.ordinal,
                length,
                limit,
                prefix: self.preview(),
            });
        }
        Ok(())
    }
}

/// Split text into trimmed, non-empty lines.
pub fn normalize_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a UTF-8 text file into normalized lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(normalize_lines(&content))
}
