// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Rebuilds a trained model from its directory and forecasts
// every complete window of a new series:
//
//   Step 1: Load train_config.json + scaler.json  (Layer 6)
//   Step 2: Load + standardise the input CSV      (Layer 4)
//   Step 3: Cut inference windows                 (Layer 4)
//   Step 4: Restore best weights, forward pass    (Layer 5)
//   Step 5: Undo the target scaling               (Layer 4)
//
// Each prediction is tagged with the index of the last input
// row of its window, so row r forecasts r+1 ..= r+horizon.

use anyhow::{ensure, Context, Result};
use burn::prelude::*;
use std::{io::Write, path::PathBuf};

use crate::application::train_use_case::{TrainConfig, CONFIG_FILE, SCALER_FILE};
use crate::data::{
    batcher::{input_tensor, WindowShape},
    loader::CsvSeriesLoader,
    preprocessor::Standardizer,
    windower::Windower,
};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the last input row of the window.
    pub row:    usize,
    pub values: Vec<f32>,
}

pub struct PredictUseCase {
    model_dir: PathBuf,
    config:    TrainConfig,
    scaler:    Standardizer,
}

impl PredictUseCase {
    /// Load the artifacts a previous `train` run left in `model_dir`.
    pub fn new(model_dir: impl Into<PathBuf>) -> Result<Self> {
        let model_dir = model_dir.into();
        let store  = CheckpointStore::new(&model_dir);
        let config: TrainConfig  = store.load_json(CONFIG_FILE)?;
        let scaler: Standardizer = store.load_json(SCALER_FILE)?;
        Ok(Self { model_dir, config, scaler })
    }

    pub fn execute<B: Backend>(
        &self,
        input:    impl Into<PathBuf>,
        use_best: bool,
        device:   B::Device,
    ) -> Result<Vec<Prediction>> {
        let cfg   = &self.config;
        let input = input.into();

        // ── Step 2: Load and standardise ──────────────────────────────────────
        let frame = CsvSeriesLoader::new(cfg.features.clone(), cfg.target.clone()).load(&input)?;
        ensure!(
            frame.columns == self.scaler.columns,
            "input columns {:?} do not match the trained columns {:?}",
            frame.columns,
            self.scaler.columns
        );
        let target_col = frame
            .column_index(&cfg.target)
            .with_context(|| format!("Target column '{}' missing", cfg.target))?;
        let rows = self.scaler.transform(&frame.rows);

        // ── Step 3: Windows ───────────────────────────────────────────────────
        let windows = Windower::new(cfg.timesteps, cfg.horizon, target_col)?.inputs(&rows);
        ensure!(
            !windows.is_empty(),
            "input has {} rows, need at least {} for one window",
            frame.len(),
            cfg.timesteps
        );
        let (ends, flat): (Vec<usize>, Vec<Vec<f32>>) = windows.into_iter().unzip();

        // ── Step 4: Forward pass ──────────────────────────────────────────────
        let shape = WindowShape {
            timesteps: cfg.timesteps,
            features:  frame.width(),
            horizon:   cfg.horizon,
        };
        let tensor = input_tensor::<B>(&flat, shape, &device)?;
        let model  = cfg.model_config(frame.width()).init::<B>(&device);
        let mut inferencer = Inferencer::<B, _>::new(model, &self.model_dir, device);
        let outputs = inferencer.predict(tensor, use_best)?;
        tracing::info!("Predicted {} windows from '{}'", outputs.len(), input.display());

        // ── Step 5: Back to original units ────────────────────────────────────
        Ok(ends
            .into_iter()
            .zip(outputs)
            .map(|(row, values)| Prediction {
                row,
                values: self.scaler.inverse_column(target_col, &values),
            })
            .collect())
    }

    pub fn horizon(&self) -> usize {
        self.config.horizon
    }
}

/// Write predictions as CSV: `row,pred_1,...,pred_H`.
pub fn write_predictions<W: Write>(writer: W, horizon: usize, predictions: &[Prediction]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["row".to_string()];
    header.extend((1..=horizon).map(|h| format!("pred_{h}")));
    out.write_record(&header)?;

    for p in predictions {
        let mut record = vec![p.row.to_string()];
        record.extend(p.values.iter().map(|v| v.to_string()));
        out.write_record(&record)?;
    }
    out.flush()?;
    Ok(())
}
