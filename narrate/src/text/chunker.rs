//! Token-budget chunking for TTS processing.

use super::TextChunk;
use super::tokenizer::TokenCounter;
use crate::error::Result;

/// Group lines into chunks of at most `budget` tokens.
///
/// Lines are never split or reordered. A line is appended to the current
/// chunk unless doing so would push its token total past `budget`, in which
/// case the current chunk is closed first. A single line larger than the
/// budget therefore ends up alone in its own chunk. Empty chunks are never
/// emitted, so empty input yields no chunks.
///
/// The budget applies to the sum of each line's own token count. A BPE
/// tokenizer can count the space-joined chunk string slightly differently,
/// since the separator usually merges into the next word but sometimes
/// becomes a token of its own. A joined chunk may therefore run over the
/// budget by a token or so per line boundary.
///
/// Chunks are numbered from 1 in input order.
pub fn chunk_lines(
    lines: &[String],
    counter: &dyn TokenCounter,
    budget: usize,
) -> Result<Vec<TextChunk>> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0;

    for line in lines {
        let line_tokens = counter.count(line)?;

        if current_tokens + line_tokens > budget && !current.is_empty() {
            let ordinal = chunks.len() + 1;
            chunks.push(TextChunk::new(ordinal, std::mem::take(&mut current)));
            current_tokens = 0;
        }

        current.push(line.clone());
        current_tokens += line_tokens;
    }

    // Don't forget the last chunk
    if !current.is_empty() {
        let ordinal = chunks.len() + 1;
        chunks.push(TextChunk::new(ordinal, current));
    }

    Ok(chunks)
}
