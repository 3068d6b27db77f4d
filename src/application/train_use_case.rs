// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the CSV series          (Layer 4 - data)
//   Step 2: Fit + apply standardisation  (Layer 4 - data)
//   Step 3: Cut sliding windows          (Layer 4 - data)
//   Step 4: Split train/validation       (Layer 4 - data)
//   Step 5: Save config + scaler         (Layer 6 - infra)
//   Step 6: Build model, Adam, schedule  (Layer 5 - ml)
//   Step 7: Run the training loop        (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{ensure, Context, Result};
use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    batcher::{SeriesLoader, WindowShape},
    dataset::SeriesDataset,
    loader::CsvSeriesLoader,
    preprocessor::Standardizer,
    splitter::{split_train_val, SplitStrategy},
    windower::Windower,
};
use crate::domain::{
    config::{EngineConfig, DEFAULT_EVAL_EVERY, DEFAULT_LR, DEFAULT_LR_DECAY_GAMMA, DEFAULT_LR_DECAY_STEP},
    events::TracingSink,
    schedule::StepDecay,
    state::TrainingReport,
};
use crate::infra::{checkpoint::CheckpointStore, metrics::MetricsLogger};
use crate::ml::{
    model::{ConvRnn, ConvRnnConfig, DEFAULT_CHANNELS, DEFAULT_KERNEL_SIZES, DEFAULT_POOLS, DEFAULT_UNITS},
    trainer::{run_training, TrainingSession},
};

pub const CONFIG_FILE: &str = "train_config.json";
pub const SCALER_FILE: &str = "scaler.json";

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run.
// Saved next to the checkpoint so `predict` can rebuild the same
// model and reproduce the same preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:          PathBuf,
    pub model_dir:          PathBuf,
    pub target:             String,
    /// Input columns besides the target; empty = every numeric column.
    pub features:           Vec<String>,
    pub timesteps:          usize,
    pub horizon:            usize,
    pub batch_size:         usize,
    pub train_fraction:     f64,
    /// None keeps the chronological split.
    pub shuffle_seed:       Option<u64>,
    pub init_seed:          Option<u64>,
    pub kernel_sizes:       Vec<usize>,
    pub pools:              Vec<usize>,
    pub channels:           usize,
    pub units:              usize,
    pub epochs:             usize,
    pub eval_every:         usize,
    pub learning_rate:      f64,
    pub lr_decay_step:      usize,
    pub lr_decay_gamma:     f64,
    pub patience:           Option<usize>,
    pub resume:             bool,
    pub checkpoint_retries: usize,
    pub device:             String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:          PathBuf::from("data/series.csv"),
            model_dir:          PathBuf::from("models"),
            target:             "target".to_string(),
            features:           Vec::new(),
            timesteps:          48,
            horizon:            1,
            batch_size:         64,
            train_fraction:     0.8,
            shuffle_seed:       None,
            init_seed:          None,
            kernel_sizes:       DEFAULT_KERNEL_SIZES.to_vec(),
            pools:              DEFAULT_POOLS.to_vec(),
            channels:           DEFAULT_CHANNELS,
            units:              DEFAULT_UNITS,
            epochs:             100,
            eval_every:         DEFAULT_EVAL_EVERY,
            learning_rate:      DEFAULT_LR,
            lr_decay_step:      DEFAULT_LR_DECAY_STEP,
            lr_decay_gamma:     DEFAULT_LR_DECAY_GAMMA,
            patience:           None,
            resume:             false,
            checkpoint_retries: 1,
            device:             "cpu".to_string(),
        }
    }
}

impl TrainConfig {
    /// The engine's view of this run.
    pub fn engine_config(&self) -> EngineConfig {
        let mut cfg = EngineConfig::new(self.epochs, &self.model_dir)
            .with_eval_every(self.eval_every)
            .with_learning_rate(self.learning_rate)
            .with_lr_decay(self.lr_decay_step, self.lr_decay_gamma)
            .with_patience(self.patience)
            .with_resume(self.resume)
            .with_device(self.device.clone());
        cfg.checkpoint_retries = self.checkpoint_retries;
        cfg
    }

    /// Adam: θ = θ - lr * m / (√v + ε). The rate itself comes from the schedule.
    pub fn optimizer_config(&self) -> AdamConfig {
        AdamConfig::new().with_epsilon(1e-8)
    }

    /// Model topology for a series with `features` input columns.
    pub fn model_config(&self, features: usize) -> ConvRnnConfig {
        ConvRnnConfig::with_topology(
            features,
            self.timesteps,
            self.horizon,
            &self.kernel_sizes,
            &self.pools,
            self.channels,
            self.units,
        )
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be > 0");
        ensure!(
            self.train_fraction > 0.0 && self.train_fraction < 1.0,
            "train_fraction must be in (0, 1), got {}",
            self.train_fraction
        );
        ensure!(
            self.kernel_sizes.len() == self.pools.len(),
            "{} kernel sizes but {} pool sizes",
            self.kernel_sizes.len(),
            self.pools.len()
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end on backend `B`.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainingReport> {
        let mut cfg = self.config.clone();
        cfg.validate()?;
        let engine_cfg = cfg.engine_config();
        engine_cfg.validate()?;

        // ── Step 1: Load the series ───────────────────────────────────────────
        tracing::info!("Loading series from '{}'", cfg.data_path.display());
        let frame = CsvSeriesLoader::new(cfg.features.clone(), cfg.target.clone())
            .load(&cfg.data_path)?;
        let target_col = frame
            .column_index(&cfg.target)
            .with_context(|| format!("Target column '{}' missing after load", cfg.target))?;
        tracing::info!("Loaded {} rows × {} columns {:?}", frame.len(), frame.width(), frame.columns);

        // Record the resolved feature list so predict reads the same columns.
        cfg.features = frame
            .columns
            .iter()
            .filter(|c| **c != cfg.target)
            .cloned()
            .collect();

        // ── Step 2: Standardise on the training prefix ────────────────────────
        let fit_rows = ((frame.len() as f64) * cfg.train_fraction).round() as usize;
        ensure!(
            fit_rows > cfg.timesteps,
            "training prefix has {fit_rows} rows, need more than timesteps ({})",
            cfg.timesteps
        );
        let scaler = Standardizer::fit(&frame.columns, &frame.rows[..fit_rows])?;
        let rows   = scaler.transform(&frame.rows);

        // ── Step 3: Sliding windows ───────────────────────────────────────────
        let windower = Windower::new(cfg.timesteps, cfg.horizon, target_col)?;
        let samples  = windower.samples(&rows);
        tracing::info!("Built {} windows (T={}, H={})", samples.len(), cfg.timesteps, cfg.horizon);

        // ── Step 4: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) = split_train_val(
            samples,
            cfg.train_fraction,
            SplitStrategy::from_seed(cfg.shuffle_seed),
        );
        ensure!(!train_samples.is_empty(), "no training windows; series too short");
        ensure!(!val_samples.is_empty(), "no validation windows; lower train_fraction or add rows");
        tracing::info!("Split: {} train, {} validation", train_samples.len(), val_samples.len());

        // ── Step 5: Save config and scaler for predict ────────────────────────
        let store = CheckpointStore::new(&cfg.model_dir);
        store.save_json(CONFIG_FILE, &cfg)?;
        store.save_json(SCALER_FILE, &scaler)?;

        // ── Step 6: Model, optimiser, schedule ────────────────────────────────
        if let Some(seed) = cfg.init_seed {
            B::seed(&device, seed);
        }
        let model_cfg = cfg.model_config(frame.width());
        model_cfg.validate()?;
        let model = model_cfg.init::<B>(&device);
        tracing::info!(
            "Model ready: {} branches, {} features → {} outputs",
            model_cfg.branches.len(), model_cfg.features, model_cfg.outputs,
        );

        let optimizer = cfg.optimizer_config().init::<B, ConvRnn<B>>();
        let scheduler = StepDecay::new(cfg.learning_rate, cfg.lr_decay_step, cfg.lr_decay_gamma);

        let shape = WindowShape {
            timesteps: cfg.timesteps,
            features:  frame.width(),
            horizon:   cfg.horizon,
        };
        // Validation batches live on the inner backend, like model.valid().
        let train_batches =
            SeriesLoader::<B>::new(SeriesDataset::new(train_samples, shape)?, cfg.batch_size, &device);
        let val_batches =
            SeriesLoader::<B::InnerBackend>::new(SeriesDataset::new(val_samples, shape)?, cfg.batch_size, &device);

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.model_dir)?;
        tracing::info!("Per-epoch metrics → '{}'", metrics.csv_path().display());
        let mut sink = (TracingSink, metrics);
        let outcome = run_training::<B, _, _, _, _, _>(
            TrainingSession { model, optimizer, scheduler, device },
            &train_batches,
            &val_batches,
            &engine_cfg,
            &mut sink,
        )?;

        Ok(outcome.report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use std::fmt::Write as _;

    use crate::domain::errors::EngineError;
    use crate::infra::checkpoint::BEST_FILE;
    use crate::infra::metrics::METRICS_FILE;

    type TestBackend = Autodiff<NdArray>;

    fn write_series(dir: &std::path::Path, rows: usize) -> PathBuf {
        let mut text = String::from("time,load,temp\n");
        for i in 0..rows {
            let t = i as f32 * 0.2;
            writeln!(text, "t{i},{:.4},{:.4}", t.sin() * 10.0 + 20.0, t.cos()).unwrap();
        }
        let path = dir.join("series.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn small_config(dir: &std::path::Path, data_path: PathBuf) -> TrainConfig {
        TrainConfig {
            data_path,
            model_dir:    dir.join("model"),
            target:       "load".into(),
            timesteps:    8,
            batch_size:   8,
            kernel_sizes: vec![3, 2],
            pools:        vec![1, 2],
            channels:     4,
            units:        4,
            epochs:       2,
            eval_every:   1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_adam_uses_small_epsilon() {
        let adam = TrainConfig::default().optimizer_config();
        // AdamConfig fields are private in burn 0.20; read them via its serde impl.
        let adam = serde_json::to_value(&adam).unwrap();
        let field = |name: &str| adam[name].as_f64().unwrap() as f32;
        assert_eq!(field("epsilon"), 1e-8);
        assert_eq!(field("beta_1"), 0.9);
        assert_eq!(field("beta_2"), 0.999);
    }

    #[test]
    fn test_engine_config_carries_run_settings() {
        let cfg = TrainConfig { epochs: 7, patience: Some(3), checkpoint_retries: 2, ..TrainConfig::default() };
        let engine = cfg.engine_config();
        assert_eq!(engine.epochs, 7);
        assert_eq!(engine.eval_every, 10);
        assert_eq!(engine.patience, Some(3));
        assert_eq!(engine.checkpoint_retries, 2);
        assert_eq!(engine.lr_decay_step, 20);
    }

    #[test]
    fn test_mismatched_topology_lists_rejected() {
        let cfg = TrainConfig { pools: vec![1, 2], ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_pipeline_writes_all_artifacts() {
        let dir  = tempfile::tempdir().unwrap();
        let data = write_series(dir.path(), 80);
        let cfg  = small_config(dir.path(), data);

        let report = TrainUseCase::new(cfg.clone())
            .execute::<TestBackend>(NdArrayDevice::Cpu)
            .unwrap();
        assert_eq!(report.epochs_run, 2);
        assert!(report.storage_failures.is_empty());

        let model_dir = cfg.model_dir;
        assert!(model_dir.join(BEST_FILE).is_file());
        assert!(model_dir.join(METRICS_FILE).is_file());

        let store = CheckpointStore::new(&model_dir);
        let saved: TrainConfig = store.load_json(CONFIG_FILE).unwrap();
        assert_eq!(saved.features, vec!["temp".to_string()]);
        let scaler: Standardizer = store.load_json(SCALER_FILE).unwrap();
        assert_eq!(scaler.columns, vec!["temp".to_string(), "load".to_string()]);
    }

    #[test]
    fn test_short_series_is_rejected_before_training() {
        let dir  = tempfile::tempdir().unwrap();
        let data = write_series(dir.path(), 6);
        let err  = TrainUseCase::new(small_config(dir.path(), data))
            .execute::<TestBackend>(NdArrayDevice::Cpu)
            .unwrap_err();
        assert!(err.downcast_ref::<EngineError>().is_none());
    }
}
