//! Free-text payload classification.
//!
//! Inputs are split into character n-grams, weighted with TF-IDF and scored by
//! a multinomial naive Bayes model. The rejection threshold is not part of the
//! classifier; callers decide what confidence is enough to act on.

mod corpus;
mod naive_bayes;
mod ngram;

use serde::{Deserialize, Serialize};

pub use corpus::{builtin_corpus, load_corpus, LabeledSample};
pub use naive_bayes::{NaiveBayesClassifier, NaiveBayesModel};
pub use ngram::CharNGramTokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Attack,
    Normal,
    Safe,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Attack => "attack",
            Label::Normal => "normal",
            Label::Safe => "safe",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Posterior probability of `label`, in `[0, 1]`.
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn is_attack_above(&self, threshold: f64) -> bool {
        self.label == Label::Attack && self.confidence > threshold
    }
}

/// Anything that can label a single string.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> ClassificationResult;

    /// False when no usable model is loaded.
    fn is_ready(&self) -> bool {
        true
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    #[error("training corpus is empty")]
    EmptyCorpus,
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model {0} has mismatched dimensions")]
    InvalidModel(String),
    #[error("invalid model or corpus json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict_and_attack_only() {
        let at = |label, confidence| ClassificationResult { label, confidence };
        assert!(at(Label::Attack, 0.76).is_attack_above(0.75));
        assert!(!at(Label::Attack, 0.75).is_attack_above(0.75));
        assert!(!at(Label::Normal, 0.99).is_attack_above(0.75));
        assert!(!at(Label::Safe, 0.99).is_attack_above(0.75));
    }

    #[test]
    fn labels_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Label::Attack).unwrap(), "\"attack\"");
        let safe: Label = serde_json::from_str("\"safe\"").unwrap();
        assert_eq!(safe, Label::Safe);
    }
}
