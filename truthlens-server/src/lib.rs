//! TruthLens Server Library - HTTP components for the detection pipeline
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod multipart;
pub mod openapi;
pub mod render;
pub mod reply;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
pub mod webhook;

pub use auth::{ApiCredential, SubmitRateLimiter};
pub use config::Config;
pub use error::ApiError;
pub use ingest::{process_mention, IngestOutcome, RejectReason};
pub use openapi::ApiDoc;
pub use reply::{HttpReplySink, NoopReplySink, Reply, ReplyError, ReplySink};
pub use routes::create_router;
pub use state::AppState;
pub use store::{
    Detection, DetectionPage, DetectionStore, EnrichmentUpdate, InsertOutcome, NewDetection,
    OracleStatus, PageView, StoreError,
};
pub use webhook::{
    challenge_response, signature_header, verify_signature, MentionEvent, WebhookEnvelope,
};
