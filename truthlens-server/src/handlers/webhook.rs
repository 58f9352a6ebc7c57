//! Webhook handlers
//!
//! Handles the mention channel: the GET challenge handshake and the POST
//! event deliveries. Event processing is decoupled from the delivery
//! acknowledgment: a valid POST is acknowledged with a bare 200 immediately
//! and processed on a spawned task, keeping us inside the upstream delivery
//! timeout.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ApiError;
use crate::ingest::process_mention;
use crate::state::AppState;
use crate::webhook::{challenge_response, verify_signature, WebhookEnvelope, SIGNATURE_HEADER};

/// Query parameters of the challenge handshake.
#[derive(Debug, Deserialize)]
pub struct CrcQuery {
    pub crc_token: Option<String>,
}

/// Handshake response body.
#[derive(Debug, Serialize)]
pub struct CrcResponse {
    pub response_token: String,
}

/// GET /webhooks/mentions - challenge handshake
///
/// Answers the `crc_token` challenge with the HMAC-SHA256 of the token
/// under the shared secret, proving ownership of the endpoint.
pub async fn crc_handler(
    State(state): State<AppState>,
    Query(query): Query<CrcQuery>,
) -> Result<Json<CrcResponse>, ApiError> {
    let token = query
        .crc_token
        .ok_or_else(|| ApiError::bad_request("Missing crc_token query parameter"))?;

    Ok(Json(CrcResponse {
        response_token: challenge_response(&state.config.webhook_secret, &token),
    }))
}

/// POST /webhooks/mentions - event delivery
///
/// Verifies the payload signature, acknowledges with a bare 200, and
/// processes each mention event on its own task. Internal processing
/// outcomes never change the acknowledgment.
pub async fn event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !verify_signature(&state.config.webhook_secret, &body, signature) {
        return Err(ApiError::unauthorized("Invalid webhook signature"));
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Malformed payloads are rejected without side effects, but the
            // delivery itself is still acknowledged.
            warn!(error = %e, "Rejecting malformed webhook payload");
            return Ok(StatusCode::OK);
        }
    };

    for event in envelope.tweet_create_events {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = process_mention(&state, &event).await {
                error!(
                    source_event_id = %event.id_str,
                    error = %e,
                    "Event processing failed"
                );
            }
        });
    }

    Ok(StatusCode::OK)
}
