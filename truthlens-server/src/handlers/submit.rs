//! Direct-submission handler
//!
//! Handles POST /api/create-results-page: the synchronous variant of
//! ingestion for callers who supply an image directly (remote URL or raw
//! bytes) rather than via a mention event. Returns the created page and
//! the classification outcome in one response.

use std::time::Instant;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use truthlens_core::{classify_with_retry, ImageInput, OracleError, Verdict};
use utoipa::ToSchema;

use crate::auth::ApiCredential;
use crate::error::ApiError;
use crate::multipart::SubmissionFields;
use crate::state::AppState;
use crate::store::{EnrichmentUpdate, NewDetection, OracleStatus};
use crate::validation::validate_image_url;

/// Header mapping a submission onto the idempotency guard.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// JSON submission body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Remote image to analyze.
    #[schema(example = "https://example.com/photo.jpg")]
    pub image_url: String,
    /// Optional enrichment metadata.
    #[serde(default)]
    pub metadata: Option<SubmitMetadata>,
}

/// Optional metadata accepted alongside a submission.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMetadata {
    /// Attributed submitter; defaults to "api".
    #[serde(default)]
    pub source_handle: Option<String>,
    /// Caption shown on the results page.
    #[serde(default)]
    pub image_description: Option<String>,
    /// Overrides the page's meta description.
    #[serde(default)]
    pub meta_description: Option<String>,
}

/// Successful submission response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    /// Short identifier of the created page.
    #[schema(example = "abcd2345")]
    pub page_id: String,
    /// Absolute URL of the results page.
    #[schema(example = "https://truthlens.example/d/abcd2345")]
    pub page_url: String,
    pub processing: ProcessingSummary,
}

/// Classification outcome of one submission.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    /// Probability in [0, 1]; null while classification is pending.
    #[schema(example = 0.85)]
    pub ai_probability: Option<f64>,
    /// Derived categorical label; null while classification is pending.
    #[schema(value_type = Option<String>, example = "AI Generated")]
    pub final_result: Option<Verdict>,
    /// Provider confidence in [0, 1].
    pub confidence: Option<f64>,
    /// Wall-clock time spent handling the submission.
    pub processing_time_ms: u64,
}

/// What the caller handed us, normalized across both content types.
struct Submission {
    input: ImageInput,
    image_url: Option<String>,
    image_blob: Option<Vec<u8>>,
    image_content_type: Option<String>,
    metadata: SubmitMetadata,
}

/// Create a results page from a direct submission
///
/// Accepts either `application/json` with `{ imageUrl, metadata? }` or
/// `multipart/form-data` with an `image` file part and an optional
/// `metadata` JSON string part. Auth via the `X-Api-Key` header; an
/// optional `Idempotency-Key` header collapses duplicate submissions onto
/// one page.
#[utoipa::path(
    post,
    path = "/api/create-results-page",
    tag = "Submission",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Page created", body = SubmitResponse),
        (status = 400, description = "Invalid image or request shape"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 413, description = "Image exceeds the size ceiling"),
        (status = 429, description = "Per-credential rate limit exceeded"),
        (status = 500, description = "Internal server error")
    ),
    security(("api_key" = []))
)]
pub async fn create_results_page_handler(
    State(state): State<AppState>,
    credential: ApiCredential,
    request: Request,
) -> Result<Json<SubmitResponse>, ApiError> {
    let started = Instant::now();

    let idempotency_key = request
        .headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| format!("api:{v}"));

    let submission = parse_submission(&state, request).await?;

    // Classify before persisting; a rejected image never creates a record.
    let (probability, confidence, status) =
        match classify_with_retry(state.oracle.as_ref(), &submission.input, &state.config.oracle_retry)
            .await
        {
            Ok(c) => (Some(c.probability), Some(c.confidence), OracleStatus::Scored),
            Err(e @ OracleError::Rejected(_)) => return Err(e.into()),
            Err(e) => {
                warn!(
                    api_key = %credential.key,
                    error = %e,
                    "Oracle retries exhausted on direct submission, degrading"
                );
                (None, None, OracleStatus::Pending)
            }
        };

    let source_handle = submission
        .metadata
        .source_handle
        .clone()
        .unwrap_or_else(|| "api".to_string());

    let outcome = state
        .store
        .insert_detection(NewDetection {
            source_event_id: idempotency_key,
            source_handle,
            image_url: submission.image_url,
            image_blob: submission.image_blob,
            image_content_type: submission.image_content_type,
            ai_probability: probability,
            oracle_confidence: confidence,
            oracle_status: Some(status),
        })
        .await?;

    let page = state.store.assign_page(outcome.detection.id).await?;

    if outcome.created {
        let enrichment = EnrichmentUpdate {
            image_description: submission.metadata.image_description,
            meta_description: submission.metadata.meta_description,
        };
        if enrichment.image_description.is_some() || enrichment.meta_description.is_some() {
            state
                .store
                .update_enrichment(outcome.detection.id, enrichment)
                .await?;
        }
    }

    // When an idempotent duplicate lost the race, answer with the winner's
    // stored outcome so both callers see the same result.
    let (ai_probability, confidence) = if outcome.created {
        (probability, confidence)
    } else {
        (
            outcome.detection.ai_probability,
            outcome.detection.oracle_confidence,
        )
    };

    Ok(Json(SubmitResponse {
        success: true,
        page_url: state.config.page_url(&page.page_id),
        page_id: page.page_id,
        processing: ProcessingSummary {
            ai_probability,
            final_result: ai_probability.map(Verdict::from_probability),
            confidence,
            processing_time_ms: started.elapsed().as_millis() as u64,
        },
    }))
}

/// Normalize the two accepted request shapes into one submission.
async fn parse_submission(state: &AppState, request: Request) -> Result<Submission, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = Json::<SubmitRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;

        let url = validate_image_url(&body.image_url)?;

        Ok(Submission {
            input: ImageInput::Url(url.to_string()),
            image_url: Some(url.to_string()),
            image_blob: None,
            image_content_type: None,
            metadata: body.metadata.unwrap_or_default(),
        })
    } else if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?;

        let fields =
            SubmissionFields::parse(&mut multipart, state.config.max_image_size()).await?;
        let image = fields.require_image()?;
        let metadata: SubmitMetadata = fields.get_json("metadata")?.unwrap_or_default();

        Ok(Submission {
            input: ImageInput::Bytes {
                data: image.data.clone(),
                content_type: image.content_type.clone(),
            },
            image_url: None,
            image_blob: Some(image.data.clone()),
            image_content_type: Some(image.content_type.clone()),
            metadata,
        })
    } else {
        Err(ApiError::bad_request(
            "Content-Type must be application/json or multipart/form-data",
        ))
    }
}
