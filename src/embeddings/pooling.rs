// pooling.rs — Mean pooling over non-special positions and L2 normalization.
//
// Both run on plain f32 slices with sequential accumulation so the output is bit-for-bit
// reproducible regardless of which inference backend produced the hidden states.

use crate::config::special_tokens::FRAMING_SLOTS;
use crate::error::{EmbedError, Result};

use super::engine::HiddenStates;

/// Average hidden states over positions `1..seq_len-1`, skipping CLS and SEP.
///
/// A sequence of exactly 2 positions (empty text) has no body and pools to the zero
/// vector. Fewer than 2 positions cannot carry the framing and is rejected.
pub fn mean_pool(states: &HiddenStates) -> Result<Vec<f32>> {
    let seq_len = states.seq_len();
    let hidden_size = states.hidden_size();

    if seq_len < FRAMING_SLOTS {
        return Err(EmbedError::DegenerateInput { seq_len });
    }

    let body = seq_len - FRAMING_SLOTS;
    if body == 0 {
        return Ok(vec![0.0; hidden_size]);
    }

    let mut sums = vec![0.0f32; hidden_size];
    for pos in 1..seq_len - 1 {
        for (sum, value) in sums.iter_mut().zip(states.row(pos)) {
            *sum += value;
        }
    }

    let divisor = body as f32;
    for sum in &mut sums {
        *sum /= divisor;
    }
    Ok(sums)
}

/// Return `vector` scaled to unit Euclidean length. All-zero vectors are returned unchanged.
///
/// The f32 sum of squares overflows past ~1.8e19 per element and underflows below ~1e-19.
/// Only in those cases is the magnitude recomputed in f64, so ordinary inputs keep the
/// f32 result.
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = magnitude(vector);
    if norm.is_normal() {
        return vector.iter().map(|x| x / norm).collect();
    }
    if vector.iter().all(|&x| x == 0.0) {
        return vector.to_vec();
    }

    let wide = vector.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    vector.iter().map(|&x| (f64::from(x) / wide) as f32).collect()
}

/// Euclidean magnitude.
pub fn magnitude(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn states(seq_len: usize, hidden_size: usize, data: Vec<f32>) -> HiddenStates {
        HiddenStates::new(seq_len, hidden_size, data).unwrap()
    }

    #[test]
    fn test_mean_pool_excludes_cls_and_sep() {
        // Shape (1, 5, 3): positions 0 and 4 hold large values that must not leak in.
        #[rustfmt::skip]
        let data = vec![
            100.0, 100.0, 100.0,
            1.0,   2.0,   3.0,
            4.0,   5.0,   6.0,
            7.0,   8.0,   9.0,
            -50.0, -50.0, -50.0,
        ];
        let pooled = mean_pool(&states(5, 3, data)).unwrap();
        assert_eq!(pooled, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_mean_pool_single_body_token() {
        let data = vec![9.0, 9.0, 0.5, -0.25, 9.0, 9.0];
        let pooled = mean_pool(&states(3, 2, data)).unwrap();
        assert_eq!(pooled, vec![0.5, -0.25]);
    }

    #[test]
    fn test_mean_pool_empty_span_is_zero_vector() {
        let pooled = mean_pool(&states(2, 4, vec![1.0; 8])).unwrap();
        assert_eq!(pooled, vec![0.0; 4]);
        assert!(pooled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mean_pool_rejects_unframed_sequence() {
        let err = mean_pool(&states(1, 4, vec![1.0; 4])).unwrap_err();
        assert!(matches!(err, EmbedError::DegenerateInput { seq_len: 1 }));
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < EPS);
        assert!((n[1] - 0.8).abs() < EPS);
        assert!((magnitude(&n) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_l2_normalize_idempotent() {
        let once = l2_normalize(&[0.3, -1.7, 2.2, 0.01]);
        let twice = l2_normalize(&once);
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < EPS);
        }
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let n = l2_normalize(&[0.0; 5]);
        assert_eq!(n, vec![0.0; 5]);
        assert!(n.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_l2_normalize_huge_components() {
        let n = l2_normalize(&[1e20, 1e20]);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((n[0] - half).abs() < EPS, "{n:?}");
        assert!((n[1] - half).abs() < EPS, "{n:?}");

        let n = l2_normalize(&[3e30, -4e30, 0.0]);
        assert!((n[0] - 0.6).abs() < EPS && (n[1] + 0.8).abs() < EPS && n[2] == 0.0, "{n:?}");
    }

    #[test]
    fn test_l2_normalize_tiny_components() {
        let n = l2_normalize(&[3e-25, 4e-25]);
        assert!((n[0] - 0.6).abs() < EPS, "{n:?}");
        assert!((n[1] - 0.8).abs() < EPS, "{n:?}");
    }

    #[test]
    fn test_l2_normalize_does_not_mutate_input() {
        let input = vec![2.0, 0.0];
        let _ = l2_normalize(&input);
        assert_eq!(input, vec![2.0, 0.0]);
    }
}
