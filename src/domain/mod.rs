// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe a training run
// independently of the tensor framework:
//
//   errors.rs    — EngineError, the engine's failure taxonomy
//   config.rs    — EngineConfig, the immutable run configuration
//   state.rs     — TrainingState / TrainingReport bookkeeping
//   events.rs    — TrainingEvent + the EventSink observability seam
//   traits.rs    — LrScheduler (scheduler adapter)
//   schedule.rs  — StepDecay learning-rate schedule
//   stopping.rs  — patience-based early stopping
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod errors;

pub mod config;

pub mod state;

pub mod events;

pub mod traits;

pub mod schedule;

pub mod stopping;
