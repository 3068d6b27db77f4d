// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the model directory on disk:
//
//   checkpoint.rs — The best-checkpoint slot
//                   Model + optimizer records, scheduler state,
//                   epoch and metric in one digest-checked file,
//                   replaced atomically (temp file + rename).
//                   Also saves/loads JSON artifacts
//                   (train_config.json, scaler.json) so
//                   prediction can rebuild the exact model.
//
//   metrics.rs    — Training metrics logging
//                   An EventSink that appends one CSV row per
//                   epoch (loss, validation MSE, learning rate).
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Atomic best-checkpoint store and JSON artifacts
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
