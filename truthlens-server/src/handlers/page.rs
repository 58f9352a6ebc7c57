//! Results page handlers
//!
//! Serves `/d/{pageId}` and its image sub-routes with the status mapping
//! the short links rely on: 200 for live pages (including the
//! analysis-in-progress state), 404 for unknown ids, 410 for soft-deleted
//! records. Successful renders bump the view counter best-effort; a broken
//! counter never fails the read path.

use std::io::Cursor;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tracing::{error, warn};
use truthlens_core::page_id::is_well_formed;

use crate::error::ApiError;
use crate::render;
use crate::state::AppState;
use crate::store::PageView;

/// Cache TTL for served image bytes, seconds. Images never change once
/// stored, so this is generous.
const IMAGE_CACHE_TTL: u64 = 86_400;

/// Bounding box for thumbnails.
const THUMB_MAX_DIM: u32 = 480;

fn cache_control(ttl_secs: u64) -> String {
    format!("public, max-age={ttl_secs}")
}

/// GET /d/{page_id} - render a results page
#[utoipa::path(
    get,
    path = "/d/{page_id}",
    tag = "Pages",
    params(("page_id" = String, Path, description = "Short page identifier")),
    responses(
        (status = 200, description = "Results page (or analysis-in-progress placeholder)"),
        (status = 404, description = "Unknown page id"),
        (status = 410, description = "Result has been removed")
    )
)]
pub async fn page_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Response {
    let error_ttl = state.config.error_cache_ttl_secs;

    // Malformed ids cannot exist; skip the store round-trip.
    if !is_well_formed(&page_id) {
        return not_found_response(error_ttl);
    }

    let view = match state.store.get_page(&page_id).await {
        Ok(view) => view,
        Err(e) => {
            error!(page_id = %page_id, error = %e, "Page lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render::error_page()),
            )
                .into_response();
        }
    };

    match view {
        None => not_found_response(error_ttl),
        Some(view) if view.detection.is_deleted() => (
            StatusCode::GONE,
            [(header::CACHE_CONTROL, cache_control(error_ttl))],
            Html(render::gone_page()),
        )
            .into_response(),
        Some(view) => {
            // Best-effort: the render must succeed even if the counter
            // update does not.
            if let Err(e) = state.store.increment_view(&page_id).await {
                warn!(page_id = %page_id, error = %e, "View counter update failed");
            }

            (
                StatusCode::OK,
                [(
                    header::CACHE_CONTROL,
                    cache_control(state.config.page_cache_ttl_secs),
                )],
                Html(render::results_page(&view, &state.config.base_url)),
            )
                .into_response()
        }
    }
}

fn not_found_response(error_ttl: u64) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CACHE_CONTROL, cache_control(error_ttl))],
        Html(render::not_found_page()),
    )
        .into_response()
}

/// GET /d/{page_id}/image - serve the analyzed image bytes
///
/// Resolves from the cached blob when present; otherwise fetches the
/// remote URL once and caches the bytes opportunistically, so page
/// longevity never depends on the upstream host.
pub async fn image_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Response, ApiError> {
    let view = lookup_live_page(&state, &page_id).await?;
    let (bytes, content_type) = resolve_image_bytes(&state, &view).await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control(IMAGE_CACHE_TTL)),
        ],
        bytes,
    )
        .into_response())
}

/// GET /d/{page_id}/thumb - downscaled JPEG preview
///
/// Falls back to the original bytes when the image cannot be decoded.
pub async fn thumb_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Response, ApiError> {
    let view = lookup_live_page(&state, &page_id).await?;
    let (bytes, content_type) = resolve_image_bytes(&state, &view).await?;

    let (bytes, content_type) = match image::load_from_memory(&bytes) {
        Ok(img) => {
            let thumb = img.thumbnail(THUMB_MAX_DIM, THUMB_MAX_DIM);
            let mut out = Cursor::new(Vec::new());
            match thumb.write_to(&mut out, image::ImageFormat::Jpeg) {
                Ok(()) => (out.into_inner(), "image/jpeg".to_string()),
                Err(e) => {
                    warn!(page_id = %page_id, error = %e, "Thumbnail encode failed, serving original");
                    (bytes, content_type)
                }
            }
        }
        Err(e) => {
            warn!(page_id = %page_id, error = %e, "Thumbnail decode failed, serving original");
            (bytes, content_type)
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control(IMAGE_CACHE_TTL)),
        ],
        bytes,
    )
        .into_response())
}

async fn lookup_live_page(state: &AppState, page_id: &str) -> Result<PageView, ApiError> {
    if !is_well_formed(page_id) {
        return Err(ApiError::not_found("No result at this address"));
    }

    let view = state
        .store
        .get_page(page_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No result at this address"))?;

    if view.detection.is_deleted() {
        return Err(ApiError::Gone("This result has been removed".to_string()));
    }

    Ok(view)
}

async fn resolve_image_bytes(
    state: &AppState,
    view: &PageView,
) -> Result<(Vec<u8>, String), ApiError> {
    if let Some(blob) = &view.detection.image_blob {
        let content_type = view
            .detection
            .image_content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        return Ok((blob.clone(), content_type));
    }

    let url = view
        .detection
        .image_url
        .as_deref()
        .ok_or_else(|| ApiError::not_found("No image stored for this result"))?;

    let response = state.http.get(url).send().await.map_err(|e| {
        ApiError::ServiceUnavailable(format!("Upstream image fetch failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::ServiceUnavailable(format!(
            "Upstream image host returned {status}"
        )));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("Upstream image read failed: {e}")))?
        .to_vec();

    // Opportunistic: next request is served from the blob.
    if let Err(e) = state
        .store
        .cache_image_blob(view.detection.id, bytes.clone(), &content_type)
        .await
    {
        warn!(
            detection_id = %view.detection.id,
            error = %e,
            "Caching fetched image bytes failed"
        );
    }

    Ok((bytes, content_type))
}
