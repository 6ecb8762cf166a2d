//! narrate configuration management.

use crate::error::{NarrateError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tts_client::{AudioFormat, ProviderConfig};

// Defaults matching the OpenAI speech API limits
const DEFAULT_TOKEN_BUDGET: usize = 500;
const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;
const DEFAULT_VOICE: &str = "onyx";
const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_TOKENIZER: &str = "tiktoken:gpt-3.5-turbo";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrateConfig {
    /// Voice name passed to the provider
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speech model passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Audio container for segments and the final file
    #[serde(default)]
    pub format: AudioFormat,

    /// Soft token budget per chunk
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Hard character ceiling per chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Token counter: "tiktoken:<model>", "huggingface:<path>" or "whitespace"
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// FFmpeg executable. None means look it up on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,

    /// Compare segment and output durations with ffprobe after concatenation
    #[serde(default)]
    pub verify_duration: bool,

    /// Attempts per chunk for transient provider failures (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Speech provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_tokenizer() -> String {
    DEFAULT_TOKENIZER.to_string()
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for NarrateConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            model: default_model(),
            format: AudioFormat::default(),
            token_budget: default_token_budget(),
            max_chunk_chars: default_max_chunk_chars(),
            tokenizer: default_tokenizer(),
            ffmpeg_path: None,
            verify_duration: false,
            max_attempts: default_max_attempts(),
            provider: ProviderConfig::default(),
        }
    }
}

impl NarrateConfig {
    /// Get the config file path: ~/.config/cli-programs/narrate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| NarrateError::Config("HOME not set".into()))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("narrate.toml"))
    }

    /// Load config from the default location, returning defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a specific file, returning defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| NarrateError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| NarrateError::Config(e.to_string()))?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.token_budget == 0 {
            return Err(NarrateError::Config("token_budget must be at least 1".into()));
        }
        if self.max_chunk_chars == 0 {
            return Err(NarrateError::Config(
                "max_chunk_chars must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(NarrateError::Config("max_attempts must be at least 1".into()));
        }
        if self.voice.trim().is_empty() {
            return Err(NarrateError::Config("voice must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(NarrateError::Config("model must not be empty".into()));
        }
        Ok(())
    }
}
