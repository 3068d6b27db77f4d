//! Step decay schedule: multiply the rate by `gamma` every `step_size` epochs.
//!
//! Formula: lr_e = base_lr * gamma ^ floor(e / step_size)

use crate::domain::traits::{LrScheduler, SchedulerState};

#[derive(Debug, Clone, PartialEq)]
pub struct StepDecay {
    base_lr:        f64,
    step_size:      usize,
    gamma:          f64,
    epochs_elapsed: usize,
}

impl StepDecay {
    /// `step_size` must be > 0; EngineConfig::validate enforces it for CLI runs.
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
            epochs_elapsed: 0,
        }
    }
}

impl LrScheduler for StepDecay {
    fn current_lr(&self) -> f64 {
        let decays = (self.epochs_elapsed / self.step_size) as i32;
        self.base_lr * self.gamma.powi(decays)
    }

    fn step(&mut self) {
        self.epochs_elapsed += 1;
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            base_lr:        self.base_lr,
            step_size:      self.step_size,
            gamma:          self.gamma,
            epochs_elapsed: self.epochs_elapsed,
            learning_rate:  self.current_lr(),
        }
    }

    fn load_state(&mut self, state: &SchedulerState) {
        self.base_lr        = state.base_lr;
        self.step_size      = state.step_size.max(1);
        self.gamma          = state.gamma;
        self.epochs_elapsed = state.epochs_elapsed;
    }
}
