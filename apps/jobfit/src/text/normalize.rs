//! Pure text utilities: accent stripping, case/whitespace folding, notation
//! rewrites and sentence splitting. Nothing here allocates global state.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::text::language::Language;

/// Spelling/notation variants rewritten before matching, applied in order.
const NOTATION_REWRITES: &[(&str, &str)] = &[
    ("react.js", "react"),
    ("reactjs", "react"),
    ("node.js", "node"),
    ("nodejs", "node"),
    ("scikit learn", "scikit-learn"),
    ("sklearn", "scikit-learn"),
    ("c plus plus", "c++"),
    ("c sharp", "c#"),
    ("google cloud platform", "gcp"),
    ("ros 1", "ros1"),
    ("ros-1", "ros1"),
    ("ros 2", "ros2"),
    ("ros-2", "ros2"),
    ("li dar", "lidar"),
    ("li-dar", "lidar"),
    ("laser radar", "lidar"),
    ("c/c++", "c++"),
    ("c / c++", "c++"),
    ("c-++", "c++"),
    ("c ++", "c++"),
];

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]\s+").expect("valid sentence regex"));

/// Removes combining marks after canonical decomposition ("é" → "e").
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, accent-free, single-spaced. Used for classification keyword
/// checks and list dedup, where notation rewrites would be unwanted.
pub fn normalize_for_classification(s: &str) -> String {
    collapse_whitespace(&strip_accents(&s.to_lowercase()))
}

/// Matching normal form: classification form plus notation rewrites.
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut s = normalize_for_classification(text);
    // Rewrites can expose new rewrite sites ("reactjsjs" → "reactjs" → "react").
    // Every rewrite except the scikit-learn spellings shortens the text, so a
    // fixed point is reached within its length in passes.
    for _ in 0..=s.len() {
        let mut rewritten = s.clone();
        for (from, to) in NOTATION_REWRITES {
            if rewritten.contains(from) {
                rewritten = rewritten.replace(from, to);
            }
        }
        let rewritten = collapse_whitespace(&rewritten);
        if rewritten == s {
            break;
        }
        s = rewritten;
    }
    s
}

/// Text handed to the embedding model. English gets a light plural fold so
/// "microservices" and "microservice" embed identically.
pub fn preprocess_for_embedding(text: &str, language: Language) -> String {
    let normalized = normalize(text);
    match language {
        Language::En => normalized
            .split(' ')
            .map(fold_plural)
            .collect::<Vec<_>>()
            .join(" "),
        Language::Fr => normalized,
    }
}

fn fold_plural(token: &str) -> &str {
    let keeps_s = ["ss", "us", "is", "os"].iter().any(|end| token.ends_with(end));
    if token.len() > 3 && token.ends_with('s') && !keeps_s && token.is_ascii() {
        &token[..token.len() - 1]
    } else {
        token
    }
}

/// Splits on sentence-terminal punctuation followed by whitespace. The
/// punctuation stays with its sentence; empty fragments are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // the punctuation is one ASCII byte
        let end = m.start() + 1;
        push_trimmed(&mut sentences, &text[start..end]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
