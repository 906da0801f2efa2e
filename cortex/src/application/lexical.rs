// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! BM25 Okapi lexical scoring over an ad-hoc corpus.
//!
//! The corpus is rebuilt for every query from the filtered candidate set, so
//! term statistics only ever reflect the bullets that can be returned.

use std::collections::HashMap;

/// Term-frequency saturation.
pub const K1: f64 = 1.5;
/// Document-length normalization.
pub const B: f64 = 0.75;
/// Floor factor applied to the mean IDF for terms whose IDF is negative.
pub const EPSILON: f64 = 0.25;

/// Split on Unicode whitespace. No case folding or stemming.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

pub struct Bm25<'a> {
    doc_freqs: Vec<HashMap<&'a str, usize>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<&'a str, f64>,
}

impl<'a> Bm25<'a> {
    pub fn new<S: AsRef<str>>(corpus: &'a [S]) -> Self {
        let mut doc_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut df: HashMap<&'a str, usize> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc.as_ref());
            doc_lens.push(tokens.len());
            let mut freqs: HashMap<&'a str, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *df.entry(*term).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let n = corpus.len() as f64;
        let total: usize = doc_lens.iter().sum();
        let avgdl = if corpus.is_empty() { 0.0 } else { total as f64 / n };

        let mut idf = HashMap::with_capacity(df.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, freq) in df {
            let freq = freq as f64;
            let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term);
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = EPSILON * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    /// One score per corpus document, in corpus order. Repeated query tokens
    /// count once per occurrence.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_tokens = tokenize(query);
        self.doc_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &len)| {
                let length_ratio = if self.avgdl > 0.0 { len as f64 / self.avgdl } else { 0.0 };
                let norm = K1 * (1.0 - B + B * length_ratio);
                query_tokens
                    .iter()
                    .map(|token| {
                        let tf = freqs.get(*token).copied().unwrap_or(0) as f64;
                        let idf = self.idf.get(*token).copied().unwrap_or(0.0);
                        idf * (tf * (K1 + 1.0)) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_document_ranks_first() {
        let corpus = vec![
            "always check the units".to_string(),
            "prefer integer arithmetic when possible".to_string(),
            "read the question twice".to_string(),
        ];
        let bm25 = Bm25::new(&corpus);
        let scores = bm25.scores("integer arithmetic");
        assert_eq!(scores.len(), 3);
        assert!(scores[1] > scores[0]);
        assert!(scores[1] > scores[2]);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn test_known_idf_value() {
        // N = 3, df("cat") = 1 → ln(2.5) - ln(1.5)
        let corpus = ["cat", "dog", "bird"];
        let bm25 = Bm25::new(&corpus);
        let expected_idf = 2.5f64.ln() - 1.5f64.ln();
        // tf = 1, dl = avgdl = 1 → factor (1 * 2.5) / (1 + 1.5) = 1
        let scores = bm25.scores("cat");
        assert!((scores[0] - expected_idf).abs() < 1e-12);
    }

    #[test]
    fn test_negative_idf_is_floored() {
        // "the" appears in every document, so its raw IDF is negative
        let corpus = ["the cat", "the dog", "the bird"];
        let bm25 = Bm25::new(&corpus);
        let raw = 0.5f64.ln() - 3.5f64.ln();
        assert!(raw < 0.0);
        let floored = bm25.idf["the"];
        assert_ne!(floored, raw);
        let mean = (raw + 3.0 * (2.5f64.ln() - 1.5f64.ln())) / 4.0;
        assert!((floored - EPSILON * mean).abs() < 1e-12);
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        let corpus = ["Rust", "rust", "go"];
        let bm25 = Bm25::new(&corpus);
        let scores = bm25.scores("rust");
        assert!(scores[1] > 0.0);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn test_empty_documents() {
        let corpus = ["", ""];
        let bm25 = Bm25::new(&corpus);
        let scores = bm25.scores("anything");
        assert_eq!(scores, vec![0.0, 0.0]);
    }
}
