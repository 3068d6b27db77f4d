// ============================================================
// Layer 3 — Engine Errors
// ============================================================
// Every failure the training / checkpoint / inference engine
// can surface. Application code works with anyhow and can
// recover the concrete kind with `downcast_ref::<EngineError>()`.
//
//   ShapeMismatch       — input/target/parameter contract violated
//   CheckpointNotFound  — restore requested, nothing persisted
//   CheckpointCorrupt   — best slot exists but fails validation
//   StorageWrite        — best slot could not be written
//   TrainingDiverged    — non-finite loss or validation metric
//
// Reference: Rust Book §9 (Error Handling), thiserror docs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context:  String,
        expected: Vec<usize>,
        got:      Vec<usize>,
    },

    #[error("no best checkpoint found in '{}'", dir.display())]
    CheckpointNotFound { dir: PathBuf },

    #[error("checkpoint '{}' is corrupt: {reason}", path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("failed to write checkpoint '{}' after {attempts} attempt(s): {source}", path.display())]
    StorageWrite {
        path:     PathBuf,
        attempts: usize,
        #[source]
        source:   std::io::Error,
    },

    #[error("training diverged at epoch {epoch}, batch {batch}: value {value}")]
    TrainingDiverged { epoch: usize, batch: usize, value: f64 },

    #[error("{0} batch source produced no batches")]
    EmptyBatches(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported device '{0}'")]
    UnsupportedDevice(String),

    #[error("record serialization failed: {0}")]
    Record(String),

    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience constructor used by every shape check in the engine.
    pub fn shape(context: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        EngineError::ShapeMismatch {
            context:  context.into(),
            expected: expected.to_vec(),
            got:      got.to_vec(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
