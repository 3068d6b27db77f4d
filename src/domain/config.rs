// ============================================================
// Layer 3 — Engine Configuration
// ============================================================
// The immutable record every training run is started with.
// It is supplied once by the caller, validated up front, and
// only ever read by the engine afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::errors::{EngineError, EngineResult};

/// Validation runs on every epoch `i` with `i % eval_every == 0`.
pub const DEFAULT_EVAL_EVERY: usize = 10;
pub const DEFAULT_LR: f64 = 1e-3;
pub const DEFAULT_LR_DECAY_STEP: usize = 20;
pub const DEFAULT_LR_DECAY_GAMMA: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub epochs:             usize,
    pub eval_every:         usize,
    pub model_dir:          PathBuf,
    /// Execution target identifier, e.g. "cpu" or "wgpu".
    pub device:             String,
    pub learning_rate:      f64,
    pub lr_decay_step:      usize,
    pub lr_decay_gamma:     f64,
    /// Stop after this many validation rounds without improvement.
    pub patience:           Option<usize>,
    /// Continue from the best checkpoint in `model_dir` if one exists.
    pub resume:             bool,
    /// Extra attempts for a failed best-slot write.
    pub checkpoint_retries: usize,
}

impl EngineConfig {
    pub fn new(epochs: usize, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            epochs,
            eval_every:         DEFAULT_EVAL_EVERY,
            model_dir:          model_dir.into(),
            device:             "cpu".to_string(),
            learning_rate:      DEFAULT_LR,
            lr_decay_step:      DEFAULT_LR_DECAY_STEP,
            lr_decay_gamma:     DEFAULT_LR_DECAY_GAMMA,
            patience:           None,
            resume:             false,
            checkpoint_retries: 1,
        }
    }

    pub fn with_eval_every(mut self, eval_every: usize) -> Self {
        self.eval_every = eval_every;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_lr_decay(mut self, step: usize, gamma: f64) -> Self {
        self.lr_decay_step  = step;
        self.lr_decay_gamma = gamma;
        self
    }

    pub fn with_patience(mut self, patience: Option<usize>) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Reject configurations the training loop cannot honour.
    pub fn validate(&self) -> EngineResult<()> {
        if self.epochs == 0 {
            return Err(EngineError::InvalidConfig("epochs must be > 0".into()));
        }
        if self.eval_every == 0 {
            return Err(EngineError::InvalidConfig("eval_every must be > 0".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.lr_decay_step == 0 {
            return Err(EngineError::InvalidConfig("lr_decay_step must be > 0".into()));
        }
        if !(self.lr_decay_gamma > 0.0 && self.lr_decay_gamma <= 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "lr_decay_gamma must be in (0, 1], got {}",
                self.lr_decay_gamma
            )));
        }
        if self.patience == Some(0) {
            return Err(EngineError::InvalidConfig("patience must be > 0 when set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = EngineConfig::new(100, "checkpoints");
        assert_eq!(cfg.eval_every, 10);
        assert_eq!(cfg.lr_decay_step, 20);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let cfg = EngineConfig::new(0, "checkpoints");
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_eval_every_rejected() {
        let cfg = EngineConfig::new(5, "checkpoints").with_eval_every(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_learning_rate_rejected() {
        assert!(EngineConfig::new(5, "c").with_learning_rate(0.0).validate().is_err());
        assert!(EngineConfig::new(5, "c").with_learning_rate(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_gamma_out_of_range_rejected() {
        assert!(EngineConfig::new(5, "c").with_lr_decay(10, 1.5).validate().is_err());
        assert!(EngineConfig::new(5, "c").with_lr_decay(10, 0.0).validate().is_err());
        assert!(EngineConfig::new(5, "c").with_lr_decay(0, 0.5).validate().is_err());
    }

    #[test]
    fn test_zero_patience_rejected() {
        let cfg = EngineConfig::new(5, "c").with_patience(Some(0));
        assert!(cfg.validate().is_err());
    }
}
