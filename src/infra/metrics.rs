// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// An EventSink that records one CSV row per completed epoch.
//
// Metrics recorded per epoch:
//   - epoch:         zero-based epoch index
//   - train_loss:    sample-weighted mean MSE over the epoch
//   - val_metric:    validation MSE, empty on epochs that
//                    did not validate
//   - learning_rate: rate the optimizer used in that epoch
//
// Output file: <model_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_metric,learning_rate
//   0,0.912300,0.887100,0.001000
//   1,0.640200,,0.001000
//   ...
//
// Rows are appended, so a resumed run continues the same file.
// A failed append is logged and dropped: losing a metrics row
// must never abort training.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::events::{EventSink, TrainingEvent};

pub const METRICS_FILE: &str = "metrics.csv";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub train_loss:    f64,
    pub val_metric:    Option<f64>,
    pub learning_rate: f64,
}

impl EpochMetrics {
    fn csv_row(&self) -> String {
        let val = self.val_metric.map(|v| format!("{v:.6}")).unwrap_or_default();
        format!("{},{:.6},{},{:.6}", self.epoch, self.train_loss, val, self.learning_rate)
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_metric,learning_rate")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl EventSink for MetricsLogger {
    fn emit(&mut self, event: &TrainingEvent) {
        if let TrainingEvent::EpochCompleted { epoch, train_loss, val_metric, learning_rate } = *event {
            let row = EpochMetrics { epoch, train_loss, val_metric, learning_rate };
            if let Err(e) = self.log(&row) {
                tracing::warn!("Could not append to '{}': {}", self.csv_path.display(), e);
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_rows_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = MetricsLogger::new(dir.path()).unwrap();

        logger.emit(&TrainingEvent::EpochCompleted {
            epoch: 0, train_loss: 0.5, val_metric: Some(0.25), learning_rate: 1e-3,
        });
        logger.emit(&TrainingEvent::Validated { epoch: 0, metric: 0.25 });
        logger.emit(&TrainingEvent::EpochCompleted {
            epoch: 1, train_loss: 0.4, val_metric: None, learning_rate: 1e-3,
        });

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "epoch,train_loss,val_metric,learning_rate",
            "0,0.500000,0.250000,0.001000",
            "1,0.400000,,0.001000",
        ]);
    }

    #[test]
    fn test_reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let first = MetricsLogger::new(dir.path()).unwrap();
        first.log(&EpochMetrics { epoch: 0, train_loss: 1.0, val_metric: None, learning_rate: 0.1 }).unwrap();

        let second = MetricsLogger::new(dir.path()).unwrap();
        let text = fs::read_to_string(second.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
