//! Reply-posting collaborator.
//!
//! Once a detection is persisted the orchestrator posts an acknowledgment
//! (probability phrase + page link) back to the mention channel. The sink
//! is a trait so tests can capture replies and keyless deployments can run
//! without one; posting failures never roll back persistence.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Attempts made before a reply is abandoned.
const REPLY_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles each retry.
const REPLY_RETRY_BASE: Duration = Duration::from_millis(500);

/// Timeout per posting attempt.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply endpoint not configured")]
    NotConfigured,

    #[error("reply request failed: {0}")]
    Request(String),

    #[error("reply endpoint returned status {0}")]
    Status(u16),
}

/// An outbound acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    /// Event id the reply answers.
    pub in_reply_to: String,
    /// Handle of the original author.
    pub recipient: String,
    /// Rendered reply text.
    pub text: String,
}

/// Destination for outbound replies.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Post one reply. A single attempt; retry is the caller's concern.
    async fn post_reply(&self, reply: &Reply) -> Result<(), ReplyError>;
}

/// HTTP reply sink posting JSON to a configured endpoint.
pub struct HttpReplySink {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpReplySink {
    pub fn new(endpoint: String, token: Option<String>) -> Result<Self, ReplyError> {
        let client = Client::builder()
            .timeout(REPLY_TIMEOUT)
            .build()
            .map_err(|e| ReplyError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl ReplySink for HttpReplySink {
    async fn post_reply(&self, reply: &Reply) -> Result<(), ReplyError> {
        let mut request = self.client.post(&self.endpoint).json(reply);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReplyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplyError::Status(status.as_u16()));
        }

        debug!(in_reply_to = %reply.in_reply_to, "Reply posted");
        Ok(())
    }
}

/// Sink used when no reply endpoint is configured; logs and succeeds so
/// ingestion never degrades to `PartiallyFailed` for a missing collaborator.
pub struct NoopReplySink;

#[async_trait]
impl ReplySink for NoopReplySink {
    async fn post_reply(&self, reply: &Reply) -> Result<(), ReplyError> {
        debug!(
            in_reply_to = %reply.in_reply_to,
            recipient = %reply.recipient,
            "Reply endpoint not configured, dropping reply"
        );
        Ok(())
    }
}

/// Post a reply with a bounded number of attempts and doubling delays.
pub async fn post_with_retry(sink: &dyn ReplySink, reply: &Reply) -> Result<(), ReplyError> {
    let mut delay = REPLY_RETRY_BASE;
    let mut last_err = ReplyError::NotConfigured;

    for attempt in 1..=REPLY_MAX_ATTEMPTS {
        match sink.post_reply(reply).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    in_reply_to = %reply.in_reply_to,
                    "Reply attempt failed"
                );
                last_err = e;
            }
        }

        if attempt < REPLY_MAX_ATTEMPTS {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySink {
        failures: AtomicU32,
    }

    #[async_trait]
    impl ReplySink for FlakySink {
        async fn post_reply(&self, _reply: &Reply) -> Result<(), ReplyError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(ReplyError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    fn reply() -> Reply {
        Reply {
            in_reply_to: "100".into(),
            recipient: "alice".into(),
            text: "done".into(),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let sink = FlakySink {
            failures: AtomicU32::new(2),
        };
        assert!(post_with_retry(&sink, &reply()).await.is_ok());
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let sink = FlakySink {
            failures: AtomicU32::new(10),
        };
        let err = post_with_retry(&sink, &reply()).await.unwrap_err();
        assert!(matches!(err, ReplyError::Status(503)));
    }

    #[tokio::test]
    async fn test_noop_sink_succeeds() {
        assert!(NoopReplySink.post_reply(&reply()).await.is_ok());
    }
}
