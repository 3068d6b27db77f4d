// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that runs tensors through a model lives here.
// Domain types stay framework-free; this layer wires them to
// burn's Module / AutodiffModule / Optimizer traits.
//
// What's in this layer:
//
//   model.rs      — Regressor adapter trait + the ConvRNN
//                   regressor:
//                   • average-pooled branches (1×, 2×, 4×)
//                   • causal Conv1d pairs with ReLU
//                   • GRU over time, last hidden state
//                   • linear head + linear skip path
//                   plus parameter-shape inspection
//
//   metric.rs     — MSE over concatenated predictions
//
//   validator.rs  — Validation runner (inference mode,
//                   batch order preserved)
//
//   trainer.rs    — Training loop controller: train pass,
//                   schedule step, periodic validation, best
//                   checkpoint, divergence and early stop
//
//   inferencer.rs — Inference runner, optionally restoring
//                   the best checkpoint first
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Cho et al. (2014) GRU

/// Regressor trait and ConvRNN architecture
pub mod model;

/// Mean squared error metric
pub mod metric;

/// Validation pass over a batch source
pub mod validator;

/// Epoch loop with validation and best-checkpointing
pub mod trainer;

/// Inference engine — restores best checkpoint and predicts
pub mod inferencer;
