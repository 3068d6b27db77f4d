// ============================================================
// Layer 4 — Sliding Windows
// ============================================================
// Turns a row-major series into supervised samples:
//
//   input  = rows[i .. i+T]                 (T x F values)
//   target = target_col of rows[i+T .. i+T+H]   (H values)
//
// Example with T=3, H=1 over rows r0..r5:
//   sample 0: input r0 r1 r2 → target r3
//   sample 1: input r1 r2 r3 → target r4
//   sample 2: input r2 r3 r4 → target r5
//
// The stride is always one row, so consecutive samples
// overlap by T-1 rows and sample order follows time order.

use anyhow::{ensure, Result};

use crate::data::dataset::SeriesSample;

pub struct Windower {
    /// Rows per input window (T)
    timesteps: usize,
    /// Future steps predicted per window (H)
    horizon: usize,
    /// Column of each row holding the value to predict
    target_column: usize,
}

impl Windower {
    pub fn new(timesteps: usize, horizon: usize, target_column: usize) -> Result<Self> {
        ensure!(timesteps > 0, "timesteps must be > 0");
        ensure!(horizon > 0, "horizon must be > 0");
        Ok(Self { timesteps, horizon, target_column })
    }

    /// Labelled samples for training and validation.
    pub fn samples(&self, rows: &[Vec<f32>]) -> Vec<SeriesSample> {
        let span = self.timesteps + self.horizon;
        if rows.len() < span {
            return Vec::new();
        }

        (0..=rows.len() - span)
            .map(|start| {
                let input  = flatten(&rows[start..start + self.timesteps]);
                let target = rows[start + self.timesteps..start + span]
                    .iter()
                    .map(|row| row[self.target_column])
                    .collect();
                SeriesSample { input, target }
            })
            .collect()
    }

    /// Unlabelled windows for inference, paired with the index of the
    /// last row each window covers.
    pub fn inputs(&self, rows: &[Vec<f32>]) -> Vec<(usize, Vec<f32>)> {
        if rows.len() < self.timesteps {
            return Vec::new();
        }

        (0..=rows.len() - self.timesteps)
            .map(|start| {
                let end = start + self.timesteps;
                (end - 1, flatten(&rows[start..end]))
            })
            .collect()
    }
}

fn flatten(rows: &[Vec<f32>]) -> Vec<f32> {
    rows.iter().flat_map(|r| r.iter().copied()).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<Vec<f32>> {
        // column 0 = feature, column 1 = target
        (0..n).map(|i| vec![i as f32 * 10.0, i as f32]).collect()
    }

    #[test]
    fn test_sample_count_and_layout() {
        let w       = Windower::new(3, 1, 1).unwrap();
        let samples = w.samples(&series(6));
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].input, vec![0.0, 0.0, 10.0, 1.0, 20.0, 2.0]);
        assert_eq!(samples[0].target, vec![3.0]);
        assert_eq!(samples[2].target, vec![5.0]);
    }

    #[test]
    fn test_multi_step_horizon() {
        let w       = Windower::new(2, 3, 1).unwrap();
        let samples = w.samples(&series(6));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].target, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_series_shorter_than_span() {
        let w = Windower::new(4, 2, 1).unwrap();
        assert!(w.samples(&series(5)).is_empty());
    }

    #[test]
    fn test_inference_windows_cover_every_end_row() {
        let w      = Windower::new(3, 1, 1).unwrap();
        let inputs = w.inputs(&series(5));
        let ends: Vec<usize> = inputs.iter().map(|(end, _)| *end).collect();
        assert_eq!(ends, vec![2, 3, 4]);
        assert_eq!(inputs[0].1.len(), 6);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(Windower::new(0, 1, 0).is_err());
        assert!(Windower::new(1, 0, 0).is_err());
    }
}
