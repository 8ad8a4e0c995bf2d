use serde::{Deserialize, Serialize};

/// Character n-gram extractor.
///
/// Text is lowercased and runs of whitespace collapse to one space before
/// windows are taken, so `<ScRiPt>` and `<script>` share features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharNGramTokenizer {
    pub min_n: usize,
    pub max_n: usize,
}

impl Default for CharNGramTokenizer {
    fn default() -> Self {
        Self { min_n: 1, max_n: 4 }
    }
}

impl CharNGramTokenizer {
    pub fn new(min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        Self {
            min_n,
            max_n: max_n.max(min_n),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let chars = normalize(text);
        let mut grams = Vec::new();
        for n in self.min_n..=self.max_n {
            if n > chars.len() {
                break;
            }
            grams.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
        }
        grams
    }
}

fn normalize(text: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}
