//! AI or Not detection provider.
//!
//! Calls the hosted AI-image detection API at <https://api.aiornot.com>.
//! URL inputs are submitted as JSON; byte inputs as multipart uploads.
//!
//! ## Features
//!
//! - TLS-only connections with a hard per-request timeout
//! - Transient/permanent error classification for the retry layer
//! - Full observability with tracing instrumentation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{Classification, DetectionOracle, ImageInput};
use crate::error::{OracleError, Result};

/// Default API endpoint for image reports.
const DEFAULT_API_URL: &str = "https://api.aiornot.com/v1/reports/image";

/// Default timeout for a single classification request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response structure from the reports endpoint.
#[derive(Debug, Deserialize)]
struct ReportResponse {
    report: Report,
}

#[derive(Debug, Deserialize)]
struct Report {
    ai: Score,
    human: Score,
}

#[derive(Debug, Deserialize)]
struct Score {
    confidence: f64,
}

/// Configuration for the AI or Not client.
#[derive(Debug, Clone)]
pub struct AiOrNotConfig {
    /// API endpoint URL.
    pub api_url: String,
    /// Bearer token for the API.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl AiOrNotConfig {
    /// Build a config from environment variables, returning `None` when no
    /// API key is present (callers fall back to the mock in development).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ORACLE_API_KEY").ok().filter(|k| !k.is_empty())?;
        let api_url =
            std::env::var("ORACLE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let timeout = std::env::var("ORACLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Some(Self {
            api_url,
            api_key,
            timeout,
        })
    }
}

/// AI or Not detection API client.
pub struct AiOrNotOracle {
    client: Client,
    config: AiOrNotConfig,
}

impl AiOrNotOracle {
    /// Create a client from the given configuration.
    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url))]
    pub fn new(config: AiOrNotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(true)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                OracleError::Unavailable(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Check if a reqwest error is transient and should be retried.
    fn is_transient_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    /// Map an HTTP error status into the oracle error taxonomy.
    fn classify_status(status: StatusCode, body: &str) -> OracleError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            OracleError::RateLimited(format!("API returned 429: {body}"))
        } else if status.is_server_error() {
            OracleError::Unavailable(format!("API returned {status}: {body}"))
        } else {
            // Remaining 4xx: the service understood us and said no.
            OracleError::Rejected(format!("API returned {status}: {body}"))
        }
    }
}

#[async_trait]
impl DetectionOracle for AiOrNotOracle {
    /// Score one image with a single API call.
    #[instrument(level = "info", skip_all, fields(source = "aiornot", input = input.kind()))]
    async fn classify(&self, input: &ImageInput) -> Result<Classification> {
        let start = Instant::now();

        let request = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key);

        let request = match input {
            ImageInput::Url(url) => request.json(&serde_json::json!({ "object": url })),
            ImageInput::Bytes { data, content_type } => {
                let part = reqwest::multipart::Part::bytes(data.clone())
                    .file_name("image")
                    .mime_str(content_type)
                    .map_err(|e| OracleError::Rejected(format!("invalid content type: {e}")))?;
                request.multipart(reqwest::multipart::Form::new().part("object", part))
            }
        };

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if Self::is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient oracle error");
                OracleError::Unavailable(format!("request failed: {e}"))
            } else {
                warn!(error = %e, latency_ms, "Permanent oracle error");
                OracleError::Rejected(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received oracle response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let latency_ms = start.elapsed().as_millis() as u64;
            let err = Self::classify_status(status, &body);
            warn!(status = %status, latency_ms, error = %err, "Oracle error status");
            return Err(err);
        }

        let parsed: ReportResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse oracle response");
            OracleError::InvalidResponse(format!("failed to parse report: {e}"))
        })?;

        let probability = parsed.report.ai.confidence;
        if !(0.0..=1.0).contains(&probability) {
            return Err(OracleError::InvalidResponse(format!(
                "probability {probability} outside [0, 1]"
            )));
        }

        let confidence = parsed.report.ai.confidence.max(parsed.report.human.confidence);
        let raw_latency_ms = start.elapsed().as_millis() as u64;
        debug!(probability, raw_latency_ms, "Classification completed");

        Ok(Classification {
            probability,
            confidence,
            raw_latency_ms,
        })
    }

    fn source_id(&self) -> &'static str {
        "aiornot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AiOrNotConfig {
        AiOrNotConfig {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_create_client() {
        assert!(AiOrNotOracle::new(test_config()).is_ok());
    }

    #[test]
    fn test_source_id() {
        let oracle = AiOrNotOracle::new(test_config()).unwrap();
        assert_eq!(oracle.source_id(), "aiornot");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            AiOrNotOracle::classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            OracleError::RateLimited(_)
        ));
        assert!(matches!(
            AiOrNotOracle::classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            OracleError::Unavailable(_)
        ));
        assert!(matches!(
            AiOrNotOracle::classify_status(StatusCode::BAD_GATEWAY, ""),
            OracleError::Unavailable(_)
        ));
        assert!(matches!(
            AiOrNotOracle::classify_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            OracleError::Rejected(_)
        ));
        assert!(matches!(
            AiOrNotOracle::classify_status(StatusCode::BAD_REQUEST, ""),
            OracleError::Rejected(_)
        ));
    }
}
