//! Mock speech provider for testing
//!
//! Provides a configurable mock provider that can simulate transient and
//! fatal failures and returns deterministic audio bytes for each input.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, TtsError};
use crate::provider::{SpeechProvider, SpeechRequest, SpeechResponse};

/// A mock provider for testing pipelines and retry behavior
pub struct MockProvider {
    /// Number of leading calls that fail (0 = never)
    fail_count: AtomicUsize,
    /// A single call index (0-based) that fails
    fail_on_call: Option<usize>,
    /// Current call count
    call_count: AtomicUsize,
    /// Error to return on failure
    fail_with: Mutex<Option<TtsError>>,
    /// Inputs received, in call order
    requests: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a provider that always succeeds
    pub fn always_succeeds() -> Self {
        Self {
            fail_count: AtomicUsize::new(0),
            fail_on_call: None,
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: TtsError) -> Self {
        Self {
            fail_count: AtomicUsize::new(n),
            fail_with: Mutex::new(Some(error)),
            ..Self::always_succeeds()
        }
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: TtsError) -> Self {
        Self::fails_then_succeeds(usize::MAX, error)
    }

    /// Create a provider that fails only on the given 0-based call
    pub fn fails_on_call(call: usize, error: TtsError) -> Self {
        Self {
            fail_on_call: Some(call),
            fail_with: Mutex::new(Some(error)),
            ..Self::always_succeeds()
        }
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the inputs received so far, in call order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// The bytes returned for a given input
    pub fn audio_for(input: &str) -> Vec<u8> {
        format!("<audio:{}>", input).into_bytes()
    }

    fn should_fail(&self, call_num: usize) -> bool {
        call_num < self.fail_count.load(Ordering::SeqCst) || self.fail_on_call == Some(call_num)
    }
}

#[async_trait]
impl SpeechProvider for MockProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.input.clone());

        if self.should_fail(call_num) {
            let error = self.fail_with.lock().unwrap();
            if let Some(err) = error.as_ref() {
                return Err(clone_error(err));
            }
        }

        Ok(SpeechResponse {
            audio: Self::audio_for(&request.input),
            format: request.format,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Clone a TtsError (needed because TtsError doesn't implement Clone)
fn clone_error(err: &TtsError) -> TtsError {
    match err {
        TtsError::MissingApiKey { provider, env_var } => TtsError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        TtsError::Unauthorized {
            message,
            status_code,
        } => TtsError::Unauthorized {
            message: message.clone(),
            status_code: *status_code,
        },
        TtsError::RateLimited { retry_after } => TtsError::RateLimited {
            retry_after: *retry_after,
        },
        TtsError::ServerError {
            message,
            status_code,
        } => TtsError::ServerError {
            message: message.clone(),
            status_code: *status_code,
        },
        TtsError::ApiError {
            message,
            status_code,
        } => TtsError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        TtsError::Timeout(d) => TtsError::Timeout(*d),
        TtsError::Network(s) => TtsError::Network(s.clone()),
        TtsError::EmptyAudio => TtsError::EmptyAudio,
        TtsError::ConfigError(s) => TtsError::ConfigError(s.clone()),
        TtsError::Io(e) => TtsError::Io(std::io::Error::new(e.kind(), e.to_string())),
    }
}
