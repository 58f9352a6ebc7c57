//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 specification for the TruthLens API, served
//! at `/api-docs/openapi.json`.

use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{
    HealthResponse, ProcessingSummary, ReadyResponse, SubmitMetadata, SubmitRequest,
    SubmitResponse,
};

/// TruthLens API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TruthLens API",
        version = "0.1.0",
        description = r#"
## AI Image Detection API

TruthLens scores images for the likelihood that they were AI-generated and
publishes every result at a durable short URL.

### How It Works

1. Submit an image via `POST /api/create-results-page` (URL or upload), or
   mention the bot with an attached photo
2. The detection oracle returns an AI-generation probability
3. The result is persisted and published at `/d/{pageId}`
4. Share the link — pages outlive the original image host

Results are probabilistic: ≥ 70% is labeled AI Generated, ≤ 30% Human
Created, anything between Uncertain.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::submit::create_results_page_handler,
        crate::handlers::page::page_handler,
    ),
    components(schemas(
        HealthResponse,
        ReadyResponse,
        SubmitRequest,
        SubmitMetadata,
        SubmitResponse,
        ProcessingSummary,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Submission", description = "Direct image submission"),
        (name = "Pages", description = "Published results pages"),
        (name = "Health", description = "Service monitoring")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
            );
        }
    }
}

/// GET /api-docs/openapi.json - the machine-readable API description
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
