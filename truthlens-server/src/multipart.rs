//! Multipart form parsing helpers
//!
//! Parses the direct-submission API's multipart/form-data shape: an
//! `image` file part plus optional text parts (notably the `metadata`
//! JSON string).

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::validation::{validate_image_size, validate_image_type};

/// An image uploaded via multipart form
#[derive(Debug, Clone)]
pub struct ImageField {
    /// Image bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field
    pub content_type: String,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart submission fields
#[derive(Debug)]
pub struct SubmissionFields {
    image: Option<ImageField>,
    text_fields: HashMap<String, String>,
}

impl SubmissionFields {
    /// Parse all fields from a multipart request, validating the image
    /// part's declared type and size as it streams in.
    pub async fn parse(
        multipart: &mut Multipart,
        max_image_size: usize,
    ) -> Result<Self, ApiError> {
        let mut image: Option<ImageField> = None;
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "image" {
                let content_type = field.content_type().map(|s| s.to_string());
                validate_image_type(content_type.as_deref())?;
                // validated above
                let content_type = content_type.unwrap_or_default();

                let file_name = field.file_name().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read image: {}", e)))?
                    .to_vec();

                validate_image_size(data.len(), max_image_size)?;

                image = Some(ImageField {
                    data,
                    content_type,
                    file_name,
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { image, text_fields })
    }

    /// Get the image field (required)
    pub fn require_image(&self) -> Result<&ImageField, ApiError> {
        self.image.as_ref().ok_or_else(|| {
            ApiError::invalid_image("No image provided. Use 'image' field in multipart form.")
        })
    }

    /// Get a text field value
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(|s| s.as_str())
    }

    /// Get a text field parsed as JSON
    ///
    /// Returns:
    /// - `Ok(Some(T))` if the field exists and is valid JSON
    /// - `Ok(None)` if the field is missing or empty
    /// - `Err(ApiError)` if the field exists but JSON parsing fails
    pub fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text_fields.get(name) {
            Some(json) if !json.is_empty() => {
                let value: T = serde_json::from_str(json)
                    .map_err(|e| ApiError::bad_request(format!("Invalid {} JSON: {}", name, e)))?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_text() {
        let mut text_fields = HashMap::new();
        text_fields.insert("metadata".to_string(), "{}".to_string());

        let fields = SubmissionFields {
            image: None,
            text_fields,
        };

        assert_eq!(fields.get_text("metadata"), Some("{}"));
        assert_eq!(fields.get_text("missing"), None);
    }

    #[test]
    fn test_get_json() {
        #[derive(serde::Deserialize)]
        struct Meta {
            source_handle: String,
        }

        let mut text_fields = HashMap::new();
        text_fields.insert(
            "metadata".to_string(),
            r#"{"source_handle": "alice"}"#.to_string(),
        );
        text_fields.insert("broken".to_string(), "{not json".to_string());

        let fields = SubmissionFields {
            image: None,
            text_fields,
        };

        let meta: Option<Meta> = fields.get_json("metadata").unwrap();
        assert_eq!(meta.unwrap().source_handle, "alice");
        assert!(fields.get_json::<Meta>("missing").unwrap().is_none());
        assert!(fields.get_json::<Meta>("broken").is_err());
    }

    #[test]
    fn test_require_image_missing() {
        let fields = SubmissionFields {
            image: None,
            text_fields: HashMap::new(),
        };

        assert!(fields.require_image().is_err());
    }
}
