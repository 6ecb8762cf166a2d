//! Speech provider implementations

pub mod mock;
mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{Result, TtsError};
use crate::provider::SpeechProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "openai-compatible" => Ok(Self::OpenAi),
            _ => Err(TtsError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Display name used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
        }
    }
}

/// Create a provider instance from config
pub fn get_provider(config: &ProviderConfig) -> Result<Box<dyn SpeechProvider>> {
    let kind = ProviderKind::from_str(&config.provider)?;
    let timeout = Duration::from_secs(config.timeout_secs);

    match kind {
        ProviderKind::OpenAi => {
            let api_key = get_api_key(config, kind)?;
            let provider = match &config.base_url {
                Some(url) => OpenAiProvider::new(url, api_key, timeout)?,
                None => OpenAiProvider::openai(api_key, timeout)?,
            };
            Ok(Box::new(provider))
        }
    }
}

/// Get API key from config or environment variable
fn get_api_key(config: &ProviderConfig, kind: ProviderKind) -> Result<String> {
    if let Some(key) = config.api_key.clone() {
        return Ok(key);
    }

    std::env::var(kind.env_var()).map_err(|_| TtsError::MissingApiKey {
        provider: kind.display_name().to_string(),
        env_var: kind.env_var().to_string(),
    })
}
