// ============================================================
// Layer 4 — Standardizer
// ============================================================
// Per-column z-score scaling:  x' = (x - mean) / std
//
// Statistics are fitted on the training prefix of the series
// only, then applied unchanged to validation rows and to any
// series given to `predict` later. The fitted scaler is saved
// next to the checkpoint (scaler.json) for that reason.
//
// A column with zero variance keeps std = 1 so it maps to 0
// instead of NaN.
//
// Reference: Rust Book §13 (Iterators)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub columns: Vec<String>,
    pub mean:    Vec<f32>,
    pub std:     Vec<f32>,
}

impl Standardizer {
    /// Fit mean and population std for every column of `rows`.
    pub fn fit(columns: &[String], rows: &[Vec<f32>]) -> Result<Self> {
        ensure!(!rows.is_empty(), "cannot fit a standardizer on zero rows");
        let width = columns.len();
        ensure!(
            rows.iter().all(|r| r.len() == width),
            "every row must have {width} values"
        );

        let n = rows.len() as f64;
        let mut mean = vec![0.0f64; width];
        for row in rows {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0f64; width];
        for row in rows {
            for ((acc, &v), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v as f64 - m;
                *acc += d * d;
            }
        }

        let std = var
            .iter()
            .map(|v| {
                let s = (v / n).sqrt();
                if s > f64::EPSILON { s as f32 } else { 1.0 }
            })
            .collect();

        Ok(Self {
            columns: columns.to_vec(),
            mean:    mean.into_iter().map(|m| m as f32).collect(),
            std,
        })
    }

    pub fn transform(&self, rows: &[Vec<f32>]) -> Vec<Vec<f32>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, &v)| (v - self.mean[i]) / self.std[i])
                    .collect()
            })
            .collect()
    }

    /// Undo the scaling of a single column (used for model outputs).
    pub fn inverse_column(&self, column: usize, values: &[f32]) -> Vec<f32> {
        values
            .iter()
            .map(|&v| v * self.std[column] + self.mean[column])
            .collect()
    }
}
