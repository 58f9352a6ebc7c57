//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use truthlens_core::RetryPolicy;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Public base URL used when building page links (default: derived from host/port)
    pub base_url: String,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 25)
    pub body_limit_mb: usize,
    /// Maximum image size per submission in MB (default: 10)
    pub max_image_size_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable global rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Global rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Global rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Per-credential submission limit per minute on the direct API (default: 30)
    pub submit_limit_per_min: u32,
    /// Shared secret for webhook CRC and payload signatures
    pub webhook_secret: String,
    /// Accepted API keys for the direct-submission API
    pub api_keys: Vec<String>,
    /// The bot's own handle; mentions authored by it are skipped
    pub bot_handle: String,
    /// Cache TTL for successful page renders, seconds (default: 300)
    pub page_cache_ttl_secs: u64,
    /// Cache TTL for 404/410 responses, seconds (default: 60)
    pub error_cache_ttl_secs: u64,
    /// Retry policy applied around the detection oracle
    pub oracle_retry: RetryPolicy,
    /// Allow the mock oracle when no API key is configured (default: false
    /// from env, true in `Default` for tests)
    pub allow_mock_oracle: bool,
    /// Reply endpoint URL; replies are dropped with a log when unset
    pub reply_api_url: Option<String>,
    /// Bearer token for the reply endpoint
    pub reply_api_token: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            base_url: "http://127.0.0.1:3000".to_string(),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 25,
            max_image_size_mb: 10,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            submit_limit_per_min: 30,
            webhook_secret: "test-webhook-secret".to_string(),
            api_keys: vec!["test-api-key".to_string()],
            bot_handle: "truthlens".to_string(),
            page_cache_ttl_secs: 300,
            error_cache_ttl_secs: 60,
            oracle_retry: RetryPolicy::default(),
            allow_mock_oracle: true, // Enabled by default for tests; from_env() defaults to false
            reply_api_url: None,
            reply_api_token: None,
            database_max_connections: 20,
            database_min_connections: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let base_url = std::env::var("BASE_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let body_limit_mb = std::env::var("BODY_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        let max_image_size_mb = std::env::var("MAX_IMAGE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_per_sec = std::env::var("RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let rate_limit_burst = std::env::var("RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let submit_limit_per_min = std::env::var("SUBMIT_LIMIT_PER_MIN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let webhook_secret = match std::env::var("WEBHOOK_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!(
                    "WEBHOOK_SECRET not set, using insecure development secret"
                );
                "insecure-dev-secret".to_string()
            }
        };

        let api_keys: Vec<String> = std::env::var("API_KEYS")
            .map(|keys| {
                keys.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if api_keys.is_empty() {
            tracing::warn!("API_KEYS not set, direct-submission API will reject all requests");
        }

        let bot_handle = std::env::var("BOT_HANDLE").unwrap_or_else(|_| "truthlens".to_string());

        let page_cache_ttl_secs = std::env::var("PAGE_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let error_cache_ttl_secs = std::env::var("ERROR_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let oracle_retry = RetryPolicy {
            max_elapsed: std::env::var("ORACLE_RETRY_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .or(RetryPolicy::default().max_elapsed),
            ..RetryPolicy::default()
        };

        let allow_mock_oracle = std::env::var("ALLOW_MOCK_ORACLE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let reply_api_url = std::env::var("REPLY_API_URL").ok().filter(|s| !s.is_empty());
        let reply_api_token = std::env::var("REPLY_API_TOKEN").ok().filter(|s| !s.is_empty());

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let database_min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        Self {
            port,
            host,
            base_url,
            allowed_origins,
            body_limit_mb,
            max_image_size_mb,
            timeout_secs,
            rate_limit_enabled,
            rate_limit_per_sec,
            rate_limit_burst,
            submit_limit_per_min,
            webhook_secret,
            api_keys,
            bot_handle,
            page_cache_ttl_secs,
            error_cache_ttl_secs,
            oracle_retry,
            allow_mock_oracle,
            reply_api_url,
            reply_api_token,
            database_max_connections,
            database_min_connections,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum image size in bytes
    pub fn max_image_size(&self) -> usize {
        self.max_image_size_mb * 1024 * 1024
    }

    /// Absolute URL of a results page
    pub fn page_url(&self, page_id: &str) -> String {
        format!("{}/d/{}", self.base_url, page_id)
    }
}
