//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    crc_handler, create_results_page_handler, event_handler, health, image_handler, page_handler,
    ready, thumb_handler,
};
use crate::openapi::openapi_json;
use crate::state::AppState;

/// Create the application router for the given state
pub fn create_router(state: AppState) -> Router {
    let config = &state.config;

    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let rate_limit_enabled = config.rate_limit_enabled;
    let rate_limit_per_sec = config.rate_limit_per_sec;
    let rate_limit_burst = config.rate_limit_burst;

    // Base router with common layers
    let router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/webhooks/mentions", get(crc_handler).post(event_handler))
        .route("/api/create-results-page", post(create_results_page_handler))
        .route("/d/{page_id}", get(page_handler))
        .route("/d/{page_id}/image", get(image_handler))
        .route("/d/{page_id}/thumb", get(thumb_handler))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(cors)
        .layer(body_limit)
        .layer(timeout);

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    if rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(rate_limit_per_sec)
            .burst_size(rate_limit_burst)
            .finish()
            .expect("Failed to build rate limiter config");

        tracing::info!(
            "Rate limiting: {} req/s (burst: {})",
            rate_limit_per_sec,
            rate_limit_burst
        );

        router
            .layer(GovernorLayer::new(Arc::new(governor_conf)))
            .layer(TraceLayer::new_for_http())
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router.layer(TraceLayer::new_for_http())
    }
}
