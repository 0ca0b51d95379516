use async_trait::async_trait;

use crate::classify::{ContentClassifier, MediaVerdict, TextVerdict};
use crate::config::ClassifierConfig;

/// Keyword-matching stand-in classifier.
///
/// Matches case-insensitively against the configured lists. Deterministic
/// for a fixed configuration, which is all the engine assumes of any
/// classifier.
pub struct KeywordClassifier {
    toxic_keywords: Vec<String>,
    flagged_media_markers: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            toxic_keywords: config
                .toxic_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            flagged_media_markers: config
                .flagged_media_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }
}

#[async_trait]
impl ContentClassifier for KeywordClassifier {
    async fn classify_text(&self, body: &str) -> anyhow::Result<TextVerdict> {
        let lowered = body.to_lowercase();
        if self.toxic_keywords.iter().any(|k| lowered.contains(k)) {
            Ok(TextVerdict::Negative)
        } else {
            Ok(TextVerdict::Neutral)
        }
    }

    async fn classify_media(&self, reference: &str) -> anyhow::Result<MediaVerdict> {
        let lowered = reference.to_lowercase();
        if self
            .flagged_media_markers
            .iter()
            .any(|m| lowered.contains(m))
        {
            Ok(MediaVerdict::Flagged)
        } else {
            Ok(MediaVerdict::Clean)
        }
    }
}
