// ============================================================
// Layer 3 — Training State and Run Report
// ============================================================
// TrainingState is owned by the training loop: created at loop
// start, mutated once per epoch, handed back when the loop
// returns. The durable artifact of a run is the best checkpoint,
// not this struct.

use serde::{Deserialize, Serialize};

use crate::domain::config::EngineConfig;

/// One improvement of the best validation metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestUpdate {
    pub epoch:  usize,
    pub metric: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub current_epoch: usize,
    /// Lowest validation metric seen so far; +inf until the first evaluation.
    pub best_metric:   f64,
    pub best_epoch:    Option<usize>,
    pub params:        EngineConfig,
}

impl TrainingState {
    pub fn new(params: EngineConfig) -> Self {
        Self {
            current_epoch: 0,
            best_metric:   f64::INFINITY,
            best_epoch:    None,
            params,
        }
    }

    /// Strict improvement only; ties keep the earlier checkpoint.
    pub fn is_improvement(&self, metric: f64) -> bool {
        metric < self.best_metric
    }

    pub fn record_best(&mut self, epoch: usize, metric: f64) -> BestUpdate {
        self.best_metric = metric;
        self.best_epoch  = Some(epoch);
        BestUpdate { epoch, metric }
    }
}

/// A best-slot write that failed even after retrying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageFailure {
    pub epoch:   usize,
    pub metric:  f64,
    pub message: String,
}

/// What a caller needs to know once `run` returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub epochs_run:       usize,
    pub final_train_loss: Option<f64>,
    pub best_history:     Vec<BestUpdate>,
    /// Non-empty means the on-disk best slot may be stale or absent.
    pub storage_failures: Vec<StorageFailure>,
    pub stopped_early:    bool,
}

impl TrainingReport {
    pub fn checkpoint_is_stale(&self) -> bool {
        match (self.best_history.last(), self.storage_failures.last()) {
            (Some(best), Some(failure)) => failure.epoch >= best.epoch,
            _ => false,
        }
    }
}
