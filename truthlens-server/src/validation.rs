//! Submission validation module
//!
//! Validates image payloads on the direct-submission path before any
//! oracle call is made.

use crate::error::ApiError;

/// Image formats accepted for analysis
const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Validates the Content-Type of a submitted image
///
/// Accepts jpeg, png, webp, and gif. Unlike generic uploads, a missing
/// Content-Type is rejected: the oracle needs to know what it is scoring.
pub fn validate_image_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            // Parameters like "; charset=" never appear on image types, but
            // multipart clients occasionally append them anyway.
            let essence = ct_lower.split(';').next().unwrap_or("").trim();
            if ALLOWED_IMAGE_TYPES.contains(&essence) {
                Ok(())
            } else {
                Err(ApiError::invalid_image(format!(
                    "Unsupported image type: '{}'. Allowed types: {}",
                    ct,
                    ALLOWED_IMAGE_TYPES.join(", ")
                )))
            }
        }
        None => Err(ApiError::invalid_image(
            "Missing image Content-Type. Allowed types: image/jpeg, image/png, image/webp, image/gif",
        )),
    }
}

/// Validates the size of a submitted image
///
/// Returns 413 when the payload exceeds the configured ceiling.
pub fn validate_image_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::invalid_image("Empty image payload"));
    }
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        Err(ApiError::PayloadTooLarge(format!(
            "Image of {} bytes exceeds maximum of {} MB",
            size, max_mb
        )))
    } else {
        Ok(())
    }
}

/// Validates a remote image URL: parseable, http(s) scheme.
pub fn validate_image_url(raw: &str) -> Result<url::Url, ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::invalid_image(format!("Invalid image URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ApiError::invalid_image(format!(
            "Unsupported URL scheme '{other}', expected http or https"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_type_allowed() {
        assert!(validate_image_type(Some("image/jpeg")).is_ok());
        assert!(validate_image_type(Some("image/png")).is_ok());
        assert!(validate_image_type(Some("image/webp")).is_ok());
        assert!(validate_image_type(Some("image/gif")).is_ok());
        assert!(validate_image_type(Some("IMAGE/JPEG")).is_ok()); // case insensitive
        assert!(validate_image_type(Some("image/png; charset=binary")).is_ok());
    }

    #[test]
    fn test_validate_image_type_rejected() {
        assert!(validate_image_type(Some("image/tiff")).is_err());
        assert!(validate_image_type(Some("video/mp4")).is_err());
        assert!(validate_image_type(Some("text/html")).is_err());
        assert!(validate_image_type(Some("application/octet-stream")).is_err());
        assert!(validate_image_type(None).is_err());
    }

    #[test]
    fn test_validate_image_size_ok() {
        let max = 10 * 1024 * 1024;
        assert!(validate_image_size(1024, max).is_ok());
        assert!(validate_image_size(max, max).is_ok()); // exactly max
    }

    #[test]
    fn test_validate_image_size_too_large() {
        let max = 10 * 1024 * 1024;
        let err = validate_image_size(max + 1, max).unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_validate_image_size_empty() {
        let err = validate_image_size(0, 1024).unwrap_err();
        assert!(matches!(err, ApiError::InvalidImage(_)));
    }

    #[test]
    fn test_validate_image_url() {
        assert!(validate_image_url("https://example.com/a.jpg").is_ok());
        assert!(validate_image_url("http://example.com/a.jpg").is_ok());
        assert!(validate_image_url("ftp://example.com/a.jpg").is_err());
        assert!(validate_image_url("not a url").is_err());
    }
}
