/// Cosine similarity between two embedding vectors.
///
/// Returns 0 for empty vectors, vectors of different lengths and
/// zero-magnitude vectors. Accumulates in f64.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Best pairing over the cross product of two variant sets. Absent vectors
/// are skipped; no usable pair scores 0.
pub fn best_cross_similarity(left: &[Option<Vec<f32>>], right: &[Option<Vec<f32>>]) -> f64 {
    let mut best = 0.0f64;
    for l in left.iter().flatten() {
        for r in right.iter().flatten() {
            best = best.max(cosine(l, r));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_similarity_is_one() {
        let v = [0.3f32, -1.2, 4.5, 0.01];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs_score_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_bounded() {
        let vectors: [&[f32]; 4] = [
            &[1.0, 2.0, 3.0],
            &[-3.0, 0.5, 2.0],
            &[1e-6, 1e6, -1e3],
            &[7.0, 7.0, 7.0],
        ];
        for a in vectors {
            for b in vectors {
                let c = cosine(a, b);
                assert!((-1.0..=1.0).contains(&c));
            }
        }
    }

    #[test]
    fn test_best_cross_similarity_picks_best_pair() {
        let left = vec![Some(vec![1.0, 0.0]), None, Some(vec![0.0, 1.0])];
        let right = vec![Some(vec![0.0, 1.0])];
        assert!((best_cross_similarity(&left, &right) - 1.0).abs() < 1e-9);
        assert_eq!(best_cross_similarity(&[None], &right), 0.0);
        assert_eq!(best_cross_similarity(&[], &right), 0.0);
    }
}
