//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use truthlens_core::OracleError;

use crate::store::StoreError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The submitted image is missing, malformed, or an unsupported format
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Unauthorized - missing or invalid API key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Gone - the resource existed but has been deleted
    #[error("Gone: {0}")]
    Gone(String),

    /// Payload exceeds the configured size ceiling
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Caller exceeded their rate limit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required dependency is not configured or reachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Detection oracle error
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an invalid image error
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Oracle(ref e) => match e {
                // External service failures → 503
                OracleError::Unavailable(_) | OracleError::RateLimited(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                // The oracle refused the image → client problem
                OracleError::Rejected(_) => StatusCode::BAD_REQUEST,
                OracleError::InvalidResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::InvalidImage(_) => "INVALID_IMAGE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Gone(_) => "GONE",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Oracle(ref e) => match e {
                OracleError::Unavailable(_) => "ORACLE_UNAVAILABLE",
                OracleError::RateLimited(_) => "ORACLE_RATE_LIMITED",
                OracleError::Rejected(_) => "INVALID_IMAGE",
                OracleError::InvalidResponse(_) => "ORACLE_ERROR",
            },
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Never leak oracle or storage internals to clients
            Self::Oracle(ref e) => match e {
                OracleError::Unavailable(_) | OracleError::RateLimited(_) => {
                    "Detection service temporarily unavailable".to_string()
                }
                OracleError::Rejected(_) => {
                    "The image could not be analyzed (unsupported or malformed)".to_string()
                }
                OracleError::InvalidResponse(_) => "Detection service error".to_string(),
            },
            Self::Store(_) => "Storage error".to_string(),
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::InvalidImage(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Gone(_) => "gone",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::RateLimited(_) => "rate_limited",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Oracle(_) => "oracle",
            Self::Store(_) => "store",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_)
            | Self::InvalidImage(_)
            | Self::NotFound(_)
            | Self::Gone(_)
            | Self::PayloadTooLarge(_)
            | Self::RateLimited(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Unauthorized(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::ServiceUnavailable(_) | Self::Oracle(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Dependency error"
                );
            }
            Self::Internal(_) | Self::Store(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
        }

        // All error responses use the `{ error, message }` envelope so
        // clients can branch on the code without parsing prose.
        let body = serde_json::json!({
            "error": code,
            "message": client_message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::invalid_image("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::Gone("x".into()).status_code(), StatusCode::GONE);
    }

    #[test]
    fn test_oracle_rejection_is_client_error() {
        let err = ApiError::Oracle(OracleError::Rejected("bad image".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_IMAGE");
    }

    #[test]
    fn test_oracle_outage_is_service_unavailable() {
        let err = ApiError::Oracle(OracleError::Unavailable("down".into()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = ApiError::Oracle(OracleError::Unavailable(
            "connect error 10.0.0.3:443".into(),
        ));
        assert!(!err.client_message().contains("10.0.0.3"));
    }
}
