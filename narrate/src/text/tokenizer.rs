//! Pluggable token counting.
//!
//! Token counts only drive chunk packing, so any tokenizer that roughly
//! matches the provider's works. The default follows the OpenAI BPE family.

use crate::error::{NarrateError, Result};
use std::path::Path;
use tiktoken_rs::CoreBPE;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> Result<usize>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// OpenAI BPE tokenizer for a model family (e.g. gpt-3.5-turbo -> cl100k_base).
pub struct TiktokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| NarrateError::Tokenizer(format!("{}: {}", model, e)))?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_ordinary(text).len())
    }

    fn describe(&self) -> String {
        format!("tiktoken ({})", self.model)
    }
}

/// A Hugging Face `tokenizer.json`.
pub struct HuggingFaceCounter {
    source: String,
    tokenizer: tokenizers::Tokenizer,
}

impl HuggingFaceCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| NarrateError::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            source: path.display().to_string(),
            tokenizer,
        })
    }
}

impl TokenCounter for HuggingFaceCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| NarrateError::Tokenizer(e.to_string()))?;
        Ok(encoding.len())
    }

    fn describe(&self) -> String {
        format!("huggingface ({})", self.source)
    }
}

/// Whitespace-separated words.
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }

    fn describe(&self) -> String {
        "whitespace".to_string()
    }
}

/// Build a counter from a selector such as `tiktoken:gpt-4o` or `whitespace`.
///
/// Accepted forms: `whitespace`, `tiktoken`, `tiktoken:<model>`,
/// `huggingface:<path>` (or `hf:<path>`).
pub fn counter_from_spec(spec: &str) -> Result<Box<dyn TokenCounter>> {
    let (kind, arg) = match spec.split_once(':') {
        Some((kind, arg)) => (kind.trim(), Some(arg.trim())),
        None => (spec.trim(), None),
    };

    match (kind.to_lowercase().as_str(), arg) {
        ("whitespace", None) => Ok(Box::new(WhitespaceCounter)),
        ("tiktoken", None) => Ok(Box::new(TiktokenCounter::for_model("gpt-3.5-turbo")?)),
        ("tiktoken", Some(model)) if !model.is_empty() => {
            Ok(Box::new(TiktokenCounter::for_model(model)?))
        }
        ("huggingface" | "hf", Some(path)) if !path.is_empty() => {
            Ok(Box::new(HuggingFaceCounter::from_file(Path::new(path))?))
        }
        _ => Err(NarrateError::Tokenizer(format!(
            "Unknown tokenizer '{}'. Use whitespace, tiktoken:<model> or huggingface:<path>",
            spec
        ))),
    }
}
