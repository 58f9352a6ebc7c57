//! Mock detection oracle for tests and keyless development.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Classification, DetectionOracle, ImageInput};
use crate::error::{OracleError, Result};

/// One scripted response from the mock.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Succeed with the given probability (confidence mirrors it).
    Probability(f64),
    /// Fail as if the service were down.
    Unavailable,
    /// Fail as if throttled.
    RateLimited,
    /// Fail permanently as an unsupported image.
    Rejected,
}

/// Scriptable oracle. Outcomes are consumed front-to-back; once the script
/// runs dry every further call returns the fallback outcome.
///
/// WARNING: for tests and keyless development only; it never looks at the
/// image.
pub struct MockOracle {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: ScriptedOutcome,
    calls: AtomicU32,
}

impl MockOracle {
    /// Always answer with the given probability.
    pub fn with_probability(probability: f64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedOutcome::Probability(probability),
            calls: AtomicU32::new(0),
        }
    }

    /// Play the given outcomes in order, then fall back to probability 0.5.
    pub fn scripted(outcomes: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback: ScriptedOutcome::Probability(0.5),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail every call as unavailable.
    pub fn always_unavailable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedOutcome::Unavailable,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of classification attempts made against this mock.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl DetectionOracle for MockOracle {
    async fn classify(&self, _input: &ImageInput) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.next_outcome() {
            ScriptedOutcome::Probability(p) => Ok(Classification {
                probability: p,
                confidence: p.max(1.0 - p),
                raw_latency_ms: 0,
            }),
            ScriptedOutcome::Unavailable => {
                Err(OracleError::Unavailable("mock outage".into()))
            }
            ScriptedOutcome::RateLimited => {
                Err(OracleError::RateLimited("mock throttle".into()))
            }
            ScriptedOutcome::Rejected => {
                Err(OracleError::Rejected("mock unsupported image".into()))
            }
        }
    }

    fn source_id(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_probability() {
        let oracle = MockOracle::with_probability(0.92);
        let input = ImageInput::Url("https://example.com/a.jpg".into());

        let first = oracle.classify(&input).await.unwrap();
        let second = oracle.classify(&input).await.unwrap();

        assert_eq!(first.probability, 0.92);
        assert_eq!(second.probability, 0.92);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_script_plays_in_order() {
        let oracle = MockOracle::scripted(vec![
            ScriptedOutcome::RateLimited,
            ScriptedOutcome::Probability(0.1),
        ]);
        let input = ImageInput::Url("https://example.com/a.jpg".into());

        assert!(matches!(
            oracle.classify(&input).await,
            Err(OracleError::RateLimited(_))
        ));
        assert_eq!(oracle.classify(&input).await.unwrap().probability, 0.1);
        // Script exhausted: fallback kicks in.
        assert_eq!(oracle.classify(&input).await.unwrap().probability, 0.5);
    }
}
