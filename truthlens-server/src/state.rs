//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use truthlens_core::DetectionOracle;

use crate::auth::SubmitRateLimiter;
use crate::config::Config;
use crate::reply::ReplySink;
use crate::store::DetectionStore;

/// Timeout for fallback fetches of remote image bytes.
const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Detection and page storage
    pub store: Arc<DetectionStore>,
    /// Detection oracle used for classification
    pub oracle: Arc<dyn DetectionOracle>,
    /// Reply sink for ingestion acknowledgments
    pub replies: Arc<dyn ReplySink>,
    /// Per-credential limiter for the direct-submission API
    pub submit_limiter: Arc<SubmitRateLimiter>,
    /// Client for fallback image fetches on the page-serving path
    pub http: reqwest::Client,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Assemble state from its parts, deriving the limiter and fetch
    /// client from the configuration.
    pub fn new(
        config: Config,
        store: DetectionStore,
        oracle: Arc<dyn DetectionOracle>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        let submit_limiter = Arc::new(SubmitRateLimiter::new(config.submit_limit_per_min));
        let http = reqwest::Client::builder()
            .timeout(IMAGE_FETCH_TIMEOUT)
            .build()
            .expect("Failed to build image fetch client");

        Self {
            store: Arc::new(store),
            oracle,
            replies,
            submit_limiter,
            http,
            config: Arc::new(config),
        }
    }
}
