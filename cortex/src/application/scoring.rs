// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Score primitives shared by the dense and lexical rankers.

/// Score assigned to every candidate when all raw scores are equal.
pub const FLAT_SCORE: f64 = 0.5;

/// Cosine similarity. A zero norm product is treated as 1, so a zero vector
/// scores 0 instead of NaN. Extra trailing components of the longer vector
/// are ignored by the dot product but still count towards its norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm = l2_norm(a) * l2_norm(b);
    let norm = if norm == 0.0 { 1.0 } else { norm };
    dot / norm
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt()
}

/// Min-max normalize into [0, 1] in place. If every score is equal (including
/// the single-candidate case) all become [`FLAT_SCORE`].
pub fn min_max_normalize(scores: &mut [f64]) {
    let (min, max) = scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));

    if max > min {
        let range = max - min;
        for s in scores.iter_mut() {
            *s = (*s - min) / range;
        }
    } else {
        scores.fill(FLAT_SCORE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_zero_vector_is_finite() {
        let score = cosine(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(score, 0.0);
        assert!(cosine(&[], &[]).is_finite());
    }

    #[test]
    fn test_normalize_range() {
        let mut scores = vec![2.0, 4.0, 3.0];
        min_max_normalize(&mut scores);
        assert_eq!(scores, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_normalize_all_equal() {
        let mut scores = vec![0.7, 0.7, 0.7];
        min_max_normalize(&mut scores);
        assert_eq!(scores, vec![0.5, 0.5, 0.5]);

        let mut single = vec![-3.2];
        min_max_normalize(&mut single);
        assert_eq!(single, vec![0.5]);

        let mut empty: Vec<f64> = vec![];
        min_max_normalize(&mut empty);
        assert!(empty.is_empty());
    }
}
