// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a CSV file on disk to ordered tensor batches.
//
//   series.csv
//       │
//       ▼
//   CsvSeriesLoader   → selects feature + target columns
//       │
//       ▼
//   Standardizer      → z-score per column (fit on train prefix)
//       │
//       ▼
//   Windower          → sliding (input, target) windows
//       │
//       ▼
//   split_train_val   → chronological or seeded shuffle
//       │
//       ▼
//   SeriesDataset     → burn Dataset, sample widths checked
//       │
//       ▼
//   SeriesBatcher     → burn Batcher: samples → tensors
//       │
//       ▼
//   SeriesLoader      → burn DataLoader behind BatchSource
//
// Reference: Burn Book §4 (Datasets, DataLoader)
//            Rust Book §13 (Iterators and Closures)

/// Reads numeric columns from a CSV file
pub mod loader;

/// Per-column z-score scaling
pub mod preprocessor;

/// Sliding-window sample construction
pub mod windower;

/// Implements burn's Dataset trait for series samples
pub mod dataset;

/// Tensor batches and the BatchSource trait
pub mod batcher;

/// Chronological / shuffled train-validation split
pub mod splitter;
