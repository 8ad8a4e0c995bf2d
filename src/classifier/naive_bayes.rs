use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    CharNGramTokenizer, ClassificationResult, ClassifierError, Label, LabeledSample, TextClassifier,
};

/// Additive smoothing. Lighter than the usual 1.0: with a few hundred
/// samples and thousands of n-gram features, alpha = 1.0 drags every
/// posterior toward the class prior and payloads fall under the block
/// threshold.
const DEFAULT_ALPHA: f64 = 0.1;

/// Fitted TF-IDF vocabulary plus multinomial naive Bayes parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    pub tokenizer: CharNGramTokenizer,
    pub alpha: f64,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    classes: Vec<Label>,
    class_log_prior: Vec<f64>,
    /// `[class][feature]`
    feature_log_prob: Vec<Vec<f64>>,
}

impl NaiveBayesModel {
    pub fn fit(samples: &[LabeledSample]) -> Result<Self, ClassifierError> {
        Self::fit_with(samples, CharNGramTokenizer::default(), DEFAULT_ALPHA)
    }

    pub fn fit_with(
        samples: &[LabeledSample],
        tokenizer: CharNGramTokenizer,
        alpha: f64,
    ) -> Result<Self, ClassifierError> {
        if samples.is_empty() {
            return Err(ClassifierError::EmptyCorpus);
        }

        let docs: Vec<Vec<String>> = samples.iter().map(|s| tokenizer.tokenize(&s.text)).collect();

        // Sorted so feature indices do not depend on hash order.
        let terms: BTreeSet<&str> = docs.iter().flatten().map(String::as_str).collect();
        let vocabulary: HashMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();
        if vocabulary.is_empty() {
            return Err(ClassifierError::EmptyCorpus);
        }

        let mut doc_freq = vec![0usize; vocabulary.len()];
        for doc in &docs {
            let seen: BTreeSet<usize> = doc.iter().filter_map(|t| vocabulary.get(t).copied()).collect();
            for idx in seen {
                doc_freq[idx] += 1;
            }
        }
        let n_docs = docs.len() as f64;
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let classes: Vec<Label> = samples
            .iter()
            .map(|s| s.label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut feature_count = vec![vec![0.0f64; vocabulary.len()]; classes.len()];
        let mut class_count = vec![0usize; classes.len()];
        for (doc, sample) in docs.iter().zip(samples) {
            let class_idx = classes
                .iter()
                .position(|&c| c == sample.label)
                .unwrap_or_default();
            class_count[class_idx] += 1;
            for (idx, weight) in tfidf(doc, &vocabulary, &idf) {
                feature_count[class_idx][idx] += weight;
            }
        }

        let class_log_prior = class_count
            .iter()
            .map(|&count| (count as f64 / n_docs).ln())
            .collect();

        let n_features = vocabulary.len() as f64;
        let feature_log_prob = feature_count
            .iter()
            .map(|counts| {
                let total: f64 = counts.iter().sum::<f64>() + alpha * n_features;
                counts.iter().map(|c| ((c + alpha) / total).ln()).collect()
            })
            .collect();

        Ok(Self {
            tokenizer,
            alpha,
            vocabulary,
            idf,
            classes,
            class_log_prior,
            feature_log_prob,
        })
    }

    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Posterior probability per class, in `classes()` order.
    pub fn predict_proba(&self, text: &str) -> Vec<f64> {
        let doc = self.tokenizer.tokenize(text);
        let features = tfidf(&doc, &self.vocabulary, &self.idf);

        let joint: Vec<f64> = self
            .class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, log_probs)| {
                prior
                    + features
                        .iter()
                        .map(|&(idx, weight)| weight * log_probs[idx])
                        .sum::<f64>()
            })
            .collect();

        let max = joint.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = joint.iter().map(|j| (j - max).exp()).collect();
        let norm: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / norm).collect()
    }

    pub fn predict(&self, text: &str) -> ClassificationResult {
        let proba = self.predict_proba(text);
        let (best, confidence) = proba
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });
        ClassificationResult {
            label: self.classes[best],
            confidence,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: Self = serde_json::from_str(&raw)?;
        let width = model.vocabulary.len();
        let consistent = !model.classes.is_empty()
            && width > 0
            && model.idf.len() == width
            && model.class_log_prior.len() == model.classes.len()
            && model.feature_log_prob.len() == model.classes.len()
            && model.feature_log_prob.iter().all(|row| row.len() == width)
            && model.vocabulary.values().all(|&idx| idx < width);
        if !consistent {
            return Err(ClassifierError::InvalidModel(path.display().to_string()));
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let raw = serde_json::to_string(self)?;
        std::fs::write(path, raw).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// L2-normalised TF-IDF weights for the in-vocabulary n-grams of `doc`.
fn tfidf(doc: &[String], vocabulary: &HashMap<String, usize>, idf: &[f64]) -> Vec<(usize, f64)> {
    let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
    for term in doc {
        if let Some(&idx) = vocabulary.get(term) {
            *counts.entry(idx).or_default() += 1.0;
        }
    }

    let mut weights: Vec<(usize, f64)> = counts
        .into_iter()
        .map(|(idx, tf)| (idx, tf * idf[idx]))
        .collect();
    let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in &mut weights {
            *w /= norm;
        }
    }
    weights
}

/// [`TextClassifier`] backed by an optional [`NaiveBayesModel`].
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesClassifier {
    model: Option<NaiveBayesModel>,
}

impl NaiveBayesClassifier {
    pub fn new(model: NaiveBayesModel) -> Self {
        Self { model: Some(model) }
    }

    /// Classifier with no model; reports not ready.
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn from_builtin_corpus() -> Result<Self, ClassifierError> {
        NaiveBayesModel::fit(&super::builtin_corpus()).map(Self::new)
    }
}

impl TextClassifier for NaiveBayesClassifier {
    fn classify(&self, text: &str) -> ClassificationResult {
        match &self.model {
            Some(model) => model.predict(text),
            None => ClassificationResult {
                label: Label::Normal,
                confidence: 0.0,
            },
        }
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::builtin_corpus;

    fn model() -> NaiveBayesModel {
        NaiveBayesModel::fit(&builtin_corpus()).unwrap()
    }

    #[test]
    fn flags_script_payloads_with_high_confidence() {
        let model = model();
        for payload in [
            "<script>alert('xss')</script>",
            "<img src=x onerror=alert('XSS')>",
            "<script>alert(document.cookie)</script>",
        ] {
            let result = model.predict(payload);
            assert_eq!(result.label, Label::Attack, "{payload}");
            assert!(result.confidence > 0.75, "{payload}: {}", result.confidence);
        }
    }

    #[test]
    fn fits_with_light_smoothing() {
        let model = model();
        assert_eq!(model.alpha, DEFAULT_ALPHA);
        // a lone letter carries almost no evidence either way
        assert!(!model.predict("x").is_attack_above(0.75));
    }

    #[test]
    fn passes_ordinary_form_values() {
        let model = model();
        for value in ["John Doe", "123 Main Street", "New York"] {
            assert_eq!(model.predict(value).label, Label::Normal, "{value}");
        }
    }

    #[test]
    fn probabilities_sum_to_one() {
        let proba = model().predict_proba("Suite 200 <b>");
        let total: f64 = proba.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn fitting_is_deterministic() {
        let a = model();
        let b = model();
        assert_eq!(a.predict_proba("Tokyo <svg>"), b.predict_proba("Tokyo <svg>"));
    }

    #[test]
    fn saved_model_predicts_the_same() {
        let model = model();
        let path = std::env::temp_dir().join(format!(
            "chain_form_guard_model_{}.json",
            std::process::id()
        ));
        model.save(&path).unwrap();
        let loaded = NaiveBayesModel::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let text = "<body onload=alert(1)>";
        let (before, after) = (model.predict(text), loaded.predict(text));
        assert_eq!(before.label, after.label);
        assert!((before.confidence - after.confidence).abs() < 1e-9);
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(
            NaiveBayesModel::fit(&[]),
            Err(ClassifierError::EmptyCorpus)
        ));
    }

    #[test]
    fn unavailable_classifier_is_not_ready() {
        let classifier = NaiveBayesClassifier::unavailable();
        assert!(!classifier.is_ready());
        assert!(!classifier.classify("<script>").is_attack_above(0.0));
    }
}
