//! Detection oracle clients.
//!
//! The oracle is the external AI-image classification service, treated as a
//! black-box scorer. This module defines the provider trait, the retry
//! policy applied around any provider, and the available implementations:
//!
//! - **AI or Not**: hosted detection API (production)
//! - **Mock**: scriptable oracle for tests and keyless development
//!
//! Providers perform a single classification attempt; retry with
//! exponential backoff is applied uniformly by [`classify_with_retry`] so
//! the policy is identical no matter which provider is configured.

mod aiornot;
mod mock;

pub use aiornot::{AiOrNotConfig, AiOrNotOracle};
pub use mock::{MockOracle, ScriptedOutcome};

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{OracleError, Result};

/// The image handed to the oracle: a fetchable URL or raw bytes.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Url(String),
    Bytes {
        data: Vec<u8>,
        content_type: String,
    },
}

impl ImageInput {
    /// Short description for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Bytes { .. } => "bytes",
        }
    }
}

/// A single classification result from the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Probability in [0, 1] that the image is AI-generated.
    pub probability: f64,
    /// Provider confidence in its own answer, in [0, 1].
    pub confidence: f64,
    /// Wall-clock latency of the successful attempt.
    pub raw_latency_ms: u64,
}

/// A detection service capable of scoring one image.
///
/// Implementations perform exactly one attempt and classify failures into
/// the [`OracleError`] taxonomy; they do not retry internally.
#[async_trait]
pub trait DetectionOracle: Send + Sync {
    /// Score one image.
    async fn classify(&self, input: &ImageInput) -> Result<Classification>;

    /// Provider identifier for logging and attestation.
    fn source_id(&self) -> &'static str;
}

/// Retry policy applied around a provider by [`classify_with_retry`].
///
/// The elapsed-time bound keeps the whole ingestion path inside the
/// upstream reply-timeliness window.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First retry interval.
    pub initial_interval: Duration,
    /// Cap on the interval between attempts.
    pub max_interval: Duration,
    /// Total budget across all attempts; `None` retries indefinitely.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            max_elapsed: Some(Duration::from_secs(20)),
        }
    }
}

impl RetryPolicy {
    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: self.max_elapsed,
            ..Default::default()
        }
    }
}

/// Classify an image, retrying transient failures with exponential backoff.
///
/// `Unavailable` and `RateLimited` errors are retried until the policy's
/// elapsed budget runs out; `Rejected` and `InvalidResponse` abort
/// immediately and are returned to the caller unchanged.
pub async fn classify_with_retry(
    oracle: &dyn DetectionOracle,
    input: &ImageInput,
    policy: &RetryPolicy,
) -> Result<Classification> {
    let backoff = policy.build_backoff();

    retry_notify(
        backoff,
        || async {
            oracle.classify(input).await.map_err(|e| {
                if e.is_transient() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        },
        |err: OracleError, duration: Duration| {
            warn!(
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Oracle retry scheduled"
            );
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Some(Duration::from_millis(500)),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let oracle = MockOracle::scripted(vec![
            ScriptedOutcome::Unavailable,
            ScriptedOutcome::Unavailable,
            ScriptedOutcome::Unavailable,
            ScriptedOutcome::Probability(0.85),
        ]);

        let input = ImageInput::Url("https://example.com/a.jpg".into());
        let result = classify_with_retry(&oracle, &input, &fast_policy())
            .await
            .unwrap();

        assert_eq!(result.probability, 0.85);
        assert_eq!(oracle.calls(), 4);
    }

    #[tokio::test]
    async fn test_rejected_is_not_retried() {
        let oracle = MockOracle::scripted(vec![ScriptedOutcome::Rejected]);

        let input = ImageInput::Url("https://example.com/a.gif".into());
        let err = classify_with_retry(&oracle, &input, &fast_policy())
            .await
            .unwrap_err();

        assert!(matches!(err, OracleError::Rejected(_)));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let oracle = MockOracle::always_unavailable();

        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed: Some(Duration::from_millis(20)),
        };
        let input = ImageInput::Url("https://example.com/a.jpg".into());
        let err = classify_with_retry(&oracle, &input, &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, OracleError::Unavailable(_)));
        assert!(oracle.calls() >= 2, "should have attempted more than once");
    }
}
