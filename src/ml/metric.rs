// ============================================================
// Layer 5 — Metric Evaluator
// ============================================================
// MSE over the full, concatenated validation set:
//
//   mse = Σ (p_i - t_i)² / n
//
// Computed once over every prediction of the pass, never as a
// mean of per-batch means (those differ when the last batch is
// smaller).

use crate::domain::errors::{EngineError, EngineResult};

pub fn mean_squared_error(predictions: &[f32], targets: &[f32]) -> EngineResult<f64> {
    if predictions.len() != targets.len() || predictions.is_empty() {
        return Err(EngineError::shape(
            "metric input",
            &[targets.len()],
            &[predictions.len()],
        ));
    }
    let sum: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| {
            let d = p as f64 - t as f64;
            d * d
        })
        .sum();
    Ok(sum / predictions.len() as f64)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_known_value() {
        let mse = mean_squared_error(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(mse, 5.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_concatenated_mean_differs_from_mean_of_batch_means() {
        // batches of 2 and 1 squared errors: [0, 0] and [9]
        let mse = mean_squared_error(&[0.0, 0.0, 3.0], &[0.0, 0.0, 0.0]).unwrap();
        assert_abs_diff_eq!(mse, 3.0);
        assert!((mse - (0.0 + 9.0) / 2.0).abs() > 1.0);
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        assert!(matches!(
            mean_squared_error(&[1.0], &[1.0, 2.0]),
            Err(EngineError::ShapeMismatch { .. })
        ));
        assert!(mean_squared_error(&[], &[]).is_err());
    }
}
