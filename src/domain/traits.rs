// ============================================================
// Layer 3 — Scheduler Adapter
// ============================================================
// The training loop advances the learning-rate schedule once
// per epoch and reads the rate it should hand to the optimizer
// before every step. Implementations must be deterministic so
// that a restored SchedulerState reproduces the same rate.
//
// The model and optimizer adapters are burn's own `Module` and
// `Optimizer` traits; see ml/model.rs.

use serde::{Deserialize, Serialize};

/// Snapshot of a schedule, persisted inside every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub base_lr:        f64,
    pub step_size:      usize,
    pub gamma:          f64,
    pub epochs_elapsed: usize,
    pub learning_rate:  f64,
}

pub trait LrScheduler {
    /// Rate to use for optimizer steps in the current epoch.
    fn current_lr(&self) -> f64;

    /// Advance one epoch. May change `current_lr`.
    fn step(&mut self);

    fn state(&self) -> SchedulerState;

    /// Replace the whole schedule, decay parameters included, with `state`.
    fn load_state(&mut self, state: &SchedulerState);
}
