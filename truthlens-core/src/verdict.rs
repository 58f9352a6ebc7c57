//! Categorical detection verdicts.
//!
//! The verdict is always derived from the stored probability at read time,
//! so it can never disagree with the number it was computed from.

use serde::{Deserialize, Serialize};

/// Probability at or above which an image is called AI-generated.
pub const AI_THRESHOLD: f64 = 0.7;

/// Probability at or below which an image is called human-created.
pub const HUMAN_THRESHOLD: f64 = 0.3;

/// Categorical label for an AI-generation probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AI Generated")]
    AiGenerated,
    #[serde(rename = "Human Created")]
    HumanCreated,
    #[serde(rename = "Uncertain")]
    Uncertain,
}

impl Verdict {
    /// Classify a probability against the fixed thresholds.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= AI_THRESHOLD {
            Self::AiGenerated
        } else if probability <= HUMAN_THRESHOLD {
            Self::HumanCreated
        } else {
            Self::Uncertain
        }
    }

    /// Human-readable label, matching the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AiGenerated => "AI Generated",
            Self::HumanCreated => "Human Created",
            Self::Uncertain => "Uncertain",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
