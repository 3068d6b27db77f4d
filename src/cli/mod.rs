// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains the model on a CSV series
//   2. `predict` — restores the best checkpoint and forecasts
//
// The --device flag picks the burn backend here; nothing
// below this layer names a concrete backend.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{bail, Result};
use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
use clap::Parser;
use std::{fs::File, io};

use crate::application::{
    predict_use_case::{write_predictions, Prediction, PredictUseCase},
    train_use_case::TrainUseCase,
};
use crate::domain::state::TrainingReport;
use commands::{Commands, DeviceKind, PredictArgs, TrainArgs};

type CpuBackend = NdArray;

#[derive(Parser, Debug)]
#[command(
    name = "convrnn-trainer",
    version,
    about = "Train a ConvRNN time-series regressor and forecast with its best checkpoint."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let device   = args.device;
    let use_case = TrainUseCase::new(args.into());
    tracing::info!("Training on '{}'", use_case.config().data_path.display());

    let report = match device {
        DeviceKind::Cpu  => use_case.execute::<Autodiff<CpuBackend>>(NdArrayDevice::Cpu)?,
        DeviceKind::Wgpu => gpu::train(&use_case)?,
    };

    print_report(&report);
    if !report.storage_failures.is_empty() {
        bail!(
            "{} checkpoint write(s) failed; the best checkpoint in '{}' may be stale or missing",
            report.storage_failures.len(),
            use_case.config().model_dir.display(),
        );
    }
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let use_case = PredictUseCase::new(&args.model_dir)?;
    let use_best = !args.no_best;

    let predictions: Vec<Prediction> = match args.device {
        DeviceKind::Cpu  => use_case.execute::<CpuBackend>(&args.input, use_best, NdArrayDevice::Cpu)?,
        DeviceKind::Wgpu => gpu::predict(&use_case, &args, use_best)?,
    };

    match &args.output {
        Some(path) => {
            write_predictions(File::create(path)?, use_case.horizon(), &predictions)?;
            println!("Wrote {} predictions to '{}'", predictions.len(), path.display());
        }
        None => write_predictions(io::stdout().lock(), use_case.horizon(), &predictions)?,
    }
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!("Epochs run:       {}", report.epochs_run);
    if let Some(loss) = report.final_train_loss {
        println!("Final train loss: {loss:.6}");
    }
    match report.best_history.last() {
        Some(best) => println!("Best val MSE:     {:.6} (epoch {})", best.metric, best.epoch),
        None       => println!("Best val MSE:     none recorded"),
    }
    if report.stopped_early {
        println!("Stopped early: no improvement within patience");
    }
    if report.checkpoint_is_stale() {
        println!("Best checkpoint on disk is older than the best val MSE above");
    }
}

#[cfg(feature = "wgpu")]
mod gpu {
    use super::*;
    use burn::backend::{wgpu::WgpuDevice, Wgpu};

    pub fn train(use_case: &TrainUseCase) -> Result<TrainingReport> {
        use_case.execute::<Autodiff<Wgpu>>(WgpuDevice::default())
    }

    pub fn predict(use_case: &PredictUseCase, args: &PredictArgs, use_best: bool) -> Result<Vec<Prediction>> {
        use_case.execute::<Wgpu>(&args.input, use_best, WgpuDevice::default())
    }
}

#[cfg(not(feature = "wgpu"))]
mod gpu {
    use super::*;
    use crate::domain::errors::EngineError;

    fn unsupported() -> anyhow::Error {
        EngineError::UnsupportedDevice("wgpu (rebuild with `--features wgpu`)".into()).into()
    }

    pub fn train(_use_case: &TrainUseCase) -> Result<TrainingReport> {
        Err(unsupported())
    }

    pub fn predict(_use_case: &PredictUseCase, _args: &PredictArgs, _use_best: bool) -> Result<Vec<Prediction>> {
        Err(unsupported())
    }
}
