//! Token-overlap similarity between two short strings.
//!
//! Each string is treated as a one-document corpus queried by the other; the
//! two BM25 scores are averaged and squashed into [0,1].

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Bm25Params;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9+#.\-]+").expect("valid token regex"));

/// Guards the length normalisation against a zero average length.
const EPSILON: f64 = 1e-9;

fn tokenize(text: &str) -> Vec<&str> {
    TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

/// Symmetric BM25 similarity in [0,1]. Inputs are expected in matching
/// normal form (see `text::normalize::normalize`); uppercase letters are
/// not tokens.
pub fn bm25_similarity(a: &str, b: &str, params: &Bm25Params) -> f64 {
    let a_tokens = tokenize(a);
    let b_tokens = tokenize(b);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let a_set: HashSet<&str> = a_tokens.iter().copied().collect();
    let b_set: HashSet<&str> = b_tokens.iter().copied().collect();
    let n_docs = 2.0;
    let idf = |term: &str| {
        let df = a_set.contains(term) as u8 as f64 + b_set.contains(term) as u8 as f64;
        ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
    };
    let avg_len = (a_tokens.len() + b_tokens.len()) as f64 / n_docs;

    let score = |query: &[&str], doc: &[&str]| -> f64 {
        let mut tf: HashMap<&str, f64> = HashMap::new();
        for term in doc {
            *tf.entry(*term).or_insert(0.0) += 1.0;
        }
        let len_norm = 1.0 - params.b + params.b * (doc.len() as f64 / (avg_len + EPSILON));
        query
            .iter()
            .map(|term| {
                let freq = tf.get(term).copied().unwrap_or(0.0);
                let denom = freq + params.k1 * len_norm;
                idf(*term) * (freq * (params.k1 + 1.0)) / (denom + EPSILON)
            })
            .sum()
    };

    let raw = (score(&a_tokens, &b_tokens) + score(&b_tokens, &a_tokens)) / 2.0;
    (raw / (raw + params.squash)).clamp(0.0, 1.0)
}
