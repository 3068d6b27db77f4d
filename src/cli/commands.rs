// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the ConvRNN regressor on a CSV time series
    Train(TrainArgs),

    /// Forecast with a trained model directory
    Predict(PredictArgs),
}

/// Where tensors live.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    /// NdArray backend on the CPU
    Cpu,
    /// WGPU backend (needs the `wgpu` cargo feature)
    Wgpu,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cpu  => "cpu",
            DeviceKind::Wgpu => "wgpu",
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV file with a header row; file order is time order
    #[arg(long)]
    pub data: PathBuf,

    /// Column to forecast
    #[arg(long)]
    pub target: String,

    /// Input columns besides the target (default: every numeric column)
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Directory for the best checkpoint, config, scaler and metrics
    #[arg(long, default_value = "models")]
    pub model_dir: PathBuf,

    /// Rows per input window
    #[arg(long, default_value_t = 48)]
    pub timesteps: usize,

    /// Future steps predicted per window
    #[arg(long, default_value_t = 1)]
    pub horizon: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Validate on every epoch i with i % eval_every == 0
    #[arg(long, default_value_t = 10)]
    pub eval_every: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Multiply the learning rate by --lr-gamma every this many epochs
    #[arg(long, default_value_t = 20)]
    pub lr_step: usize,

    #[arg(long, default_value_t = 0.9)]
    pub lr_gamma: f64,

    /// Fraction of windows used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Shuffle windows with this seed before splitting (default: chronological split)
    #[arg(long)]
    pub shuffle_seed: Option<u64>,

    /// Seed for weight initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Convolution kernel size per branch
    #[arg(long, value_delimiter = ',', default_value = "7,5,3")]
    pub kernel_sizes: Vec<usize>,

    /// Average-pooling factor per branch
    #[arg(long, value_delimiter = ',', default_value = "1,2,4")]
    pub pools: Vec<usize>,

    #[arg(long, default_value_t = 32)]
    pub channels: usize,

    /// GRU hidden units per branch
    #[arg(long, default_value_t = 32)]
    pub units: usize,

    /// Stop after this many validation rounds without improvement
    #[arg(long)]
    pub patience: Option<usize>,

    /// Continue from the best checkpoint in --model-dir
    #[arg(long)]
    pub resume: bool,

    /// Extra attempts for a failed checkpoint write
    #[arg(long, default_value_t = 1)]
    pub checkpoint_retries: usize,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:          a.data,
            model_dir:          a.model_dir,
            target:             a.target,
            features:           a.features,
            timesteps:          a.timesteps,
            horizon:            a.horizon,
            batch_size:         a.batch_size,
            train_fraction:     a.train_fraction,
            shuffle_seed:       a.shuffle_seed,
            init_seed:          a.seed,
            kernel_sizes:       a.kernel_sizes,
            pools:              a.pools,
            channels:           a.channels,
            units:              a.units,
            epochs:             a.epochs,
            eval_every:         a.eval_every,
            learning_rate:      a.lr,
            lr_decay_step:      a.lr_step,
            lr_decay_gamma:     a.lr_gamma,
            patience:           a.patience,
            resume:             a.resume,
            checkpoint_retries: a.checkpoint_retries,
            device:             a.device.as_str().to_string(),
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// CSV with the same columns the model was trained on
    #[arg(long)]
    pub input: PathBuf,

    /// Directory written by `train`
    #[arg(long, default_value = "models")]
    pub model_dir: PathBuf,

    /// Write predictions here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Use the freshly initialised weights instead of the best checkpoint
    #[arg(long)]
    pub no_best: bool,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn test_train_defaults_map_to_config() {
        let parsed = Harness::try_parse_from(["bin", "train", "--data", "s.csv", "--target", "load"]).unwrap();
        let Commands::Train(args) = parsed.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.kernel_sizes, vec![7, 5, 3]);
        assert_eq!(cfg.pools, vec![1, 2, 4]);
        assert_eq!(cfg.eval_every, 10);
        assert_eq!(cfg.lr_decay_step, 20);
        assert_eq!(cfg.device, "cpu");
        assert!(cfg.features.is_empty());
    }

    #[test]
    fn test_comma_separated_lists() {
        let parsed = Harness::try_parse_from([
            "bin", "train", "--data", "s.csv", "--target", "y",
            "--features", "a,b", "--kernel-sizes", "3,3", "--pools", "1,2", "--device", "wgpu",
        ])
        .unwrap();
        let Commands::Train(args) = parsed.command else { panic!("expected train") };
        assert_eq!(args.features, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(args.kernel_sizes, vec![3, 3]);
        assert_eq!(args.device, DeviceKind::Wgpu);
    }

    #[test]
    fn test_predict_flags() {
        let parsed = Harness::try_parse_from(["bin", "predict", "--input", "x.csv", "--no-best"]).unwrap();
        let Commands::Predict(args) = parsed.command else { panic!("expected predict") };
        assert!(args.no_best);
        assert_eq!(args.model_dir, PathBuf::from("models"));
        assert!(args.output.is_none());
    }
}
