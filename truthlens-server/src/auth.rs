//! API-key authentication for the direct-submission API.
//!
//! Auth is a single shared-credential check: the `X-Api-Key` header must
//! match one of the configured keys. The extractor also enforces the
//! per-credential fixed-window rate limit so handlers reject throttled
//! callers before reading any body bytes.

use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Width of the rate-limit window.
const WINDOW: Duration = Duration::from_secs(60);

/// A validated API credential.
#[derive(Debug, Clone)]
pub struct ApiCredential {
    /// The accepted key; used as the rate-limit bucket.
    pub key: String,
}

impl FromRequestParts<AppState> for ApiCredential {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing X-Api-Key header"))?;

        if !state.config.api_keys.iter().any(|k| k == presented) {
            return Err(ApiError::unauthorized("Invalid API key"));
        }

        state.submit_limiter.check(presented)?;

        Ok(Self {
            key: presented.to_string(),
        })
    }
}

struct WindowSlot {
    window_start: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by credential.
pub struct SubmitRateLimiter {
    limit_per_window: u32,
    windows: DashMap<String, WindowSlot>,
}

impl SubmitRateLimiter {
    /// A limit of 0 disables throttling.
    pub fn new(limit_per_window: u32) -> Self {
        Self {
            limit_per_window,
            windows: DashMap::new(),
        }
    }

    /// Count one request against the key's current window.
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        if self.limit_per_window == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut slot = self.windows.entry(key.to_string()).or_insert(WindowSlot {
            window_start: now,
            count: 0,
        });

        if now.duration_since(slot.window_start) >= WINDOW {
            slot.window_start = now;
            slot.count = 0;
        }

        if slot.count >= self.limit_per_window {
            return Err(ApiError::RateLimited(format!(
                "Limit of {} submissions per minute exceeded",
                self.limit_per_window
            )));
        }

        slot.count += 1;
        Ok(())
    }
}
