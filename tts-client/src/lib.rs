//! Speech synthesis client library for the narrate workspace
//!
//! Provides a provider-agnostic interface for turning text into audio bytes:
//! - OpenAI speech API (direct HTTP)
//! - Mock provider for tests
//!
//! Callers construct a provider explicitly and pass it around; nothing here
//! holds global client state.

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;
pub mod retry;

pub use config::ProviderConfig;
pub use error::{Result, TtsError};
pub use provider::{AudioFormat, SpeechProvider, SpeechRequest, SpeechResponse};
pub use providers::{MockProvider, OpenAiProvider, ProviderKind, get_provider};
pub use retry::{RetryPolicy, synthesize_with_retry};
