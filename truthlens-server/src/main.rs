//! TruthLens Server - AI-image detection ingestion and results pages
//!
//! Wires configuration, storage, the detection oracle, and the reply sink
//! into the HTTP application:
//! - GET/POST /webhooks/mentions - mention-event ingestion
//! - POST /api/create-results-page - direct submissions
//! - GET /d/{pageId} - published results pages

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use truthlens_core::{AiOrNotConfig, AiOrNotOracle, DetectionOracle, MockOracle};

use truthlens_server::config::Config;
use truthlens_server::reply::{HttpReplySink, NoopReplySink, ReplySink};
use truthlens_server::routes::create_router;
use truthlens_server::state::AppState;
use truthlens_server::store::DetectionStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store = match DetectionStore::from_env(
        config.database_max_connections,
        config.database_min_connections,
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize detection storage");
            std::process::exit(1);
        }
    };

    let oracle: Arc<dyn DetectionOracle> = match AiOrNotConfig::from_env() {
        Some(oracle_config) => match AiOrNotOracle::new(oracle_config) {
            Ok(oracle) => Arc::new(oracle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create detection oracle client");
                std::process::exit(1);
            }
        },
        None if config.allow_mock_oracle => {
            tracing::warn!("ORACLE_API_KEY not set, using mock oracle - scores are fake!");
            Arc::new(MockOracle::with_probability(0.5))
        }
        None => {
            tracing::error!("ORACLE_API_KEY not set and ALLOW_MOCK_ORACLE is not 'true'");
            std::process::exit(1);
        }
    };

    let replies: Arc<dyn ReplySink> = match &config.reply_api_url {
        Some(url) => match HttpReplySink::new(url.clone(), config.reply_api_token.clone()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create reply client");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("REPLY_API_URL not set, mention replies will be dropped");
            Arc::new(NoopReplySink)
        }
    };

    let addr = config.socket_addr();
    let state = AppState::new(config, store, oracle, replies);
    let app = create_router(state);

    tracing::info!(%addr, "TruthLens server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, draining connections");
}
