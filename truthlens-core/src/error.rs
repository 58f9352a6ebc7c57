use thiserror::Error;

/// Errors surfaced by the detection oracle client.
///
/// The taxonomy mirrors how callers must react: `Unavailable` and
/// `RateLimited` are transient and eligible for retry with backoff;
/// `Rejected` is permanent and must never be retried.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network failure or 5xx from the detection service.
    #[error("detection service unavailable: {0}")]
    Unavailable(String),

    /// The detection service throttled us (429).
    #[error("detection service rate limited: {0}")]
    RateLimited(String),

    /// The image was rejected as malformed or unsupported. Terminal.
    #[error("image rejected by detection service: {0}")]
    Rejected(String),

    /// The service answered but the response could not be interpreted.
    #[error("invalid detection service response: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(OracleError::Unavailable("timeout".into()).is_transient());
        assert!(OracleError::RateLimited("429".into()).is_transient());
        assert!(!OracleError::Rejected("not an image".into()).is_transient());
        assert!(!OracleError::InvalidResponse("bad json".into()).is_transient());
    }
}
