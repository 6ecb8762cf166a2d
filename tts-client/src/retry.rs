//! Bounded retry with exponential backoff for speech requests.

use std::time::Duration;

use crate::error::Result;
use crate::provider::{SpeechProvider, SpeechRequest, SpeechResponse};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one (1 = no retry)
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt budget and default delays.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f32(
            (delay.as_secs_f32() * self.backoff_factor).min(self.max_delay.as_secs_f32()),
        )
    }
}

/// Synthesize a request, retrying transient failures.
///
/// Fatal errors (see [`crate::TtsError::is_retryable`]) are returned immediately.
/// A rate-limit `Retry-After` hint replaces the computed delay. A hint
/// longer than `max_delay` ends the retries, since an earlier attempt would
/// only be rejected again.
pub async fn synthesize_with_retry(
    provider: &dyn SpeechProvider,
    request: &SpeechRequest,
    policy: &RetryPolicy,
) -> Result<SpeechResponse> {
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match provider.synthesize(request).await {
            Ok(response) => return Ok(response),
            Err(e) if !e.is_retryable() || attempt >= policy.max_attempts => return Err(e),
            Err(e) => {
                let wait = match e.retry_after() {
                    Some(hint) if hint > policy.max_delay => {
                        log::warn!(
                            "{} asked to wait {:?}, longer than the {:?} retry limit",
                            provider.name(),
                            hint,
                            policy.max_delay
                        );
                        return Err(e);
                    }
                    Some(hint) => hint,
                    None => delay,
                };
                log::warn!(
                    "{} request failed (attempt {}/{}): {}; retrying in {:?}",
                    provider.name(),
                    attempt,
                    policy.max_attempts,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
