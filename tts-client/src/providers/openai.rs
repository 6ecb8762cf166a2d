//! OpenAI speech API provider
//!
//! Direct HTTP implementation of `POST /audio/speech`. Any server that
//! implements the same endpoint can be targeted through a custom base URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsError};
use crate::provider::{SpeechProvider, SpeechRequest, SpeechResponse};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Provider for the OpenAI speech endpoint
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiProvider {
    /// Create a provider against an arbitrary OpenAI-compatible base URL
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TtsError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client,
        })
    }

    /// Create a provider for api.openai.com
    pub fn openai(api_key: String, timeout: Duration) -> Result<Self> {
        Self::new(OPENAI_API_URL, api_key, timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }

    fn transport_error(&self, err: reqwest::Error) -> TtsError {
        if err.is_timeout() {
            TtsError::Timeout(self.timeout)
        } else {
            TtsError::Network(err.to_string())
        }
    }
}

// OpenAI API request/response types

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Map a non-success HTTP status to a typed error
fn status_error(status: u16, message: String, retry_after: Option<u64>) -> TtsError {
    match status {
        401 | 403 => TtsError::Unauthorized {
            message,
            status_code: status,
        },
        429 => TtsError::RateLimited { retry_after },
        500..=599 => TtsError::ServerError {
            message,
            status_code: status,
        },
        _ => TtsError::ApiError {
            message,
            status_code: Some(status),
        },
    }
}

fn error_message(body: String) -> String {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error_response) => error_response.error.message,
        Err(_) => body,
    }
}

#[async_trait]
impl SpeechProvider for OpenAiProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechResponse> {
        let body = SpeechBody {
            model: &request.model,
            voice: &request.voice,
            input: &request.input,
            response_format: request.format.extension(),
        };

        log::debug!(
            "POST {} (model={}, voice={}, {} chars)",
            self.endpoint(),
            request.model,
            request.voice,
            request.input.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(
                status.as_u16(),
                error_message(error_text),
                retry_after,
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }

        Ok(SpeechResponse {
            audio: audio.to_vec(),
            format: request.format,
        })
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}
