//! TruthLens Core - AI-image detection primitives
//!
//! This crate provides the domain building blocks for the TruthLens
//! detection pipeline:
//!
//! - Fixed-threshold verdict classification ([`Verdict`])
//! - Short page-identifier generation from a restricted alphabet
//! - The detection oracle client with uniform retry/backoff policy
//!
//! # Example
//!
//! ```no_run
//! use truthlens_core::{classify_with_retry, ImageInput, MockOracle, RetryPolicy, Verdict};
//!
//! # async fn example() -> truthlens_core::Result<()> {
//! // Use the mock oracle for testing (production uses AiOrNotOracle)
//! let oracle = MockOracle::with_probability(0.92);
//!
//! let input = ImageInput::Url("https://example.com/photo.jpg".into());
//! let result = classify_with_retry(&oracle, &input, &RetryPolicy::default()).await?;
//!
//! assert_eq!(Verdict::from_probability(result.probability), Verdict::AiGenerated);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod oracle;
pub mod page_id;
pub mod verdict;

// Re-export main types for convenience
pub use error::{OracleError, Result};
pub use oracle::{
    classify_with_retry, AiOrNotConfig, AiOrNotOracle, Classification, DetectionOracle,
    ImageInput, MockOracle, RetryPolicy, ScriptedOutcome,
};
pub use page_id::{draw_candidate, is_clean, is_well_formed, PAGE_ID_ALPHABET, PAGE_ID_LEN};
pub use verdict::{Verdict, AI_THRESHOLD, HUMAN_THRESHOLD};
