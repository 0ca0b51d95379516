//! Content Classifier contract
//!
//! The engine consumes a classification capability, not an implementation.
//! A real deployment plugs in a network-backed model; [`KeywordClassifier`]
//! is the bundled stand-in. Calls are wrapped in a timeout guard that
//! degrades to `Neutral`/`Clean` when the classifier is slow or failing:
//! availability is favored over maximal moderation coverage.

mod keyword;

pub use keyword::KeywordClassifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::EngineError;

/// Verdict for a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextVerdict {
    Negative,
    Neutral,
}

/// Verdict for a media reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaVerdict {
    Flagged,
    Clean,
}

/// Pluggable content classification capability.
///
/// Implementations may be arbitrarily slow (network calls); the engine
/// bounds every call and never blocks unrelated members on one verdict.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify_text(&self, body: &str) -> anyhow::Result<TextVerdict>;

    async fn classify_media(&self, reference: &str) -> anyhow::Result<MediaVerdict>;
}

/// Timeout guard around a classifier.
///
/// Timeouts and classifier errors fail open: the message is treated as
/// neutral/clean and the degradation is logged, never propagated into the
/// passive moderation path.
pub struct GuardedClassifier {
    inner: Arc<dyn ContentClassifier>,
    timeout: Duration,
}

impl GuardedClassifier {
    pub fn new(inner: Arc<dyn ContentClassifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn classify_text(&self, body: &str) -> TextVerdict {
        match tokio::time::timeout(self.timeout, self.inner.classify_text(body)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(error = %e, "Text classification failed, treating message as neutral");
                TextVerdict::Neutral
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "{}", EngineError::ClassifierTimeout
                );
                TextVerdict::Neutral
            }
        }
    }

    pub async fn classify_media(&self, reference: &str) -> MediaVerdict {
        match tokio::time::timeout(self.timeout, self.inner.classify_media(reference)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(error = %e, "Media classification failed, treating media as clean");
                MediaVerdict::Clean
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "{}", EngineError::ClassifierTimeout
                );
                MediaVerdict::Clean
            }
        }
    }
}
