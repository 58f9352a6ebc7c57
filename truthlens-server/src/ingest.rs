//! Ingestion orchestrator for mention events.
//!
//! Drives one event through the pipeline:
//! Received → Validated → ImageExtracted → Classified → Persisted → Replied,
//! with terminal `Rejected` (no side effects) and `PartiallyFailed`
//! (persisted, reply lost) outcomes. Signature validation happens in the
//! webhook handler before this module is reached.
//!
//! Oracle failures never block ingestion: retry exhaustion degrades to a
//! null probability marked `pending`, oracle rejection to `unsupported`.
//! Reply failures never roll back persistence.

use tracing::{info, warn};
use truthlens_core::{classify_with_retry, ImageInput, OracleError, Verdict};

use crate::reply::{post_with_retry, Reply};
use crate::state::AppState;
use crate::store::{NewDetection, OracleStatus, StoreError};
use crate::webhook::MentionEvent;

/// Why an event was rejected without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The mention was authored by the bot itself.
    SelfMention,
    /// No qualifying image attached; documented no-op, not a failure.
    NoImage,
}

/// Terminal state of one event's ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing was persisted.
    Rejected(RejectReason),
    /// Detection and page exist; reply (if configured) went out.
    Completed {
        page_id: String,
        /// False when an earlier delivery of the same event won.
        created: bool,
    },
    /// Detection and page exist and are servable, but the reply was lost
    /// after bounded retries.
    PartiallyFailed { page_id: String },
}

/// Process one validated mention event to a terminal state.
pub async fn process_mention(
    state: &AppState,
    event: &MentionEvent,
) -> Result<IngestOutcome, StoreError> {
    // The bot's own posts mention its handle; replying would loop.
    if event
        .user
        .screen_name
        .eq_ignore_ascii_case(&state.config.bot_handle)
    {
        return Ok(IngestOutcome::Rejected(RejectReason::SelfMention));
    }

    // Idempotency: at-least-once delivery collapses onto the first record.
    if let Some(existing) = state.store.find_by_source_event(&event.id_str).await? {
        let page = state.store.assign_page(existing.id).await?;
        info!(
            source_event_id = %event.id_str,
            page_id = %page.page_id,
            "Duplicate event delivery, reusing existing detection"
        );
        return Ok(IngestOutcome::Completed {
            page_id: page.page_id,
            created: false,
        });
    }

    let Some(image_url) = event.primary_image() else {
        info!(source_event_id = %event.id_str, "No image to analyze, skipping event");
        return Ok(IngestOutcome::Rejected(RejectReason::NoImage));
    };

    // Classify before persisting so a scored record is written in one shot.
    let input = ImageInput::Url(image_url.to_string());
    let (probability, confidence, status) =
        match classify_with_retry(state.oracle.as_ref(), &input, &state.config.oracle_retry).await
        {
            Ok(c) => (Some(c.probability), Some(c.confidence), OracleStatus::Scored),
            Err(OracleError::Rejected(reason)) => {
                warn!(
                    source_event_id = %event.id_str,
                    reason = %reason,
                    "Oracle rejected image, recording as unsupported"
                );
                (None, None, OracleStatus::Unsupported)
            }
            Err(e) => {
                warn!(
                    source_event_id = %event.id_str,
                    error = %e,
                    "Oracle retries exhausted, persisting without probability"
                );
                (None, None, OracleStatus::Pending)
            }
        };

    let outcome = state
        .store
        .insert_detection(NewDetection {
            source_event_id: Some(event.id_str.clone()),
            source_handle: event.user.screen_name.clone(),
            image_url: Some(image_url.to_string()),
            image_blob: None,
            image_content_type: None,
            ai_probability: probability,
            oracle_confidence: confidence,
            oracle_status: Some(status),
        })
        .await?;

    let page = state.store.assign_page(outcome.detection.id).await?;

    if !outcome.created {
        // Lost the insert race to a concurrent delivery; its pipeline owns
        // the reply.
        return Ok(IngestOutcome::Completed {
            page_id: page.page_id,
            created: false,
        });
    }

    let page_url = state.config.page_url(&page.page_id);
    let reply = Reply {
        in_reply_to: event.id_str.clone(),
        recipient: event.user.screen_name.clone(),
        text: reply_text(probability, status, &page_url),
    };

    if let Err(e) = post_with_retry(state.replies.as_ref(), &reply).await {
        warn!(
            source_event_id = %event.id_str,
            page_id = %page.page_id,
            error = %e,
            "Reply failed after retries, record remains servable"
        );
        return Ok(IngestOutcome::PartiallyFailed {
            page_id: page.page_id,
        });
    }

    info!(
        source_event_id = %event.id_str,
        page_id = %page.page_id,
        probability = ?probability,
        "Event ingested"
    );

    Ok(IngestOutcome::Completed {
        page_id: page.page_id,
        created: true,
    })
}

/// Compose the acknowledgment text for a detection outcome.
fn reply_text(probability: Option<f64>, status: OracleStatus, page_url: &str) -> String {
    match probability {
        Some(p) => {
            let percent = (p * 100.0).round() as u32;
            match Verdict::from_probability(p) {
                Verdict::AiGenerated => {
                    format!("🤖 {percent}% likely AI-generated. Full result: {page_url}")
                }
                Verdict::HumanCreated => format!(
                    "📷 Looks human-created ({percent}% AI likelihood). Full result: {page_url}"
                ),
                Verdict::Uncertain => format!(
                    "🤔 Inconclusive ({percent}% AI likelihood). Full result: {page_url}"
                ),
            }
        }
        None if status == OracleStatus::Unsupported => {
            format!("We couldn't analyze this image format. Details: {page_url}")
        }
        None => {
            format!("⏳ Still analyzing this image — the result will appear at {page_url}")
        }
    }
}
