//! Shared helpers for server integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use truthlens_core::{DetectionOracle, RetryPolicy};
use truthlens_server::config::Config;
use truthlens_server::reply::{NoopReplySink, Reply, ReplyError, ReplySink};
use truthlens_server::state::AppState;
use truthlens_server::store::DetectionStore;
use truthlens_server::webhook::{EventUser, MediaEntities, MediaEntry, MentionEvent};

/// Configuration for hermetic tests: memory store, no rate limiting, and a
/// retry policy measured in milliseconds.
pub fn test_config() -> Config {
    Config {
        base_url: "http://testhost".to_string(),
        oracle_retry: RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Some(Duration::from_millis(200)),
        },
        ..Config::default()
    }
}

pub fn build_state(oracle: Arc<dyn DetectionOracle>) -> AppState {
    build_state_with(test_config(), oracle, Arc::new(NoopReplySink))
}

pub fn build_state_with(
    config: Config,
    oracle: Arc<dyn DetectionOracle>,
    replies: Arc<dyn ReplySink>,
) -> AppState {
    AppState::new(config, DetectionStore::in_memory(), oracle, replies)
}

/// Reply sink that records every posted reply.
#[derive(Default)]
pub struct CaptureReplySink {
    pub posted: Mutex<Vec<Reply>>,
}

#[async_trait]
impl ReplySink for CaptureReplySink {
    async fn post_reply(&self, reply: &Reply) -> Result<(), ReplyError> {
        self.posted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reply.clone());
        Ok(())
    }
}

/// Reply sink that always fails.
pub struct FailingReplySink;

#[async_trait]
impl ReplySink for FailingReplySink {
    async fn post_reply(&self, _reply: &Reply) -> Result<(), ReplyError> {
        Err(ReplyError::Status(500))
    }
}

/// Build a mention event with the given photos attached.
pub fn mention_event(id: &str, screen_name: &str, photo_urls: &[&str]) -> MentionEvent {
    MentionEvent {
        id_str: id.to_string(),
        text: format!("@truthlens is this real? ({id})"),
        user: EventUser {
            id_str: "7".to_string(),
            screen_name: screen_name.to_string(),
        },
        entities: None,
        extended_entities: Some(MediaEntities {
            media: photo_urls
                .iter()
                .map(|url| MediaEntry {
                    media_url_https: Some(url.to_string()),
                    media_url: None,
                    kind: "photo".to_string(),
                })
                .collect(),
        }),
    }
}
