// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Runs a regressor in inference mode over a batch of windows.
//
// With `use_best`, the best checkpoint in the model directory
// is loaded into the held model BEFORE the forward pass. This
// replaces the live weights: every later call sees the
// restored parameters, whether or not it asks for `use_best`.
//
// Asking for `use_best` when no checkpoint exists fails with
// CheckpointNotFound; it never falls back to the untrained
// weights silently.
//
// Inference is expected on a plain (non-autodiff) backend,
// e.g. the `InnerModule` of a trained model.

use burn::prelude::*;
use std::path::PathBuf;

use crate::domain::errors::EngineResult;
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::model::Regressor;
use crate::ml::validator::{into_rows, tensor_values};

pub struct Inferencer<B: Backend, M> {
    model:  M,
    store:  CheckpointStore,
    device: B::Device,
}

impl<B: Backend, M: Regressor<B>> Inferencer<B, M> {
    pub fn new(model: M, model_dir: impl Into<PathBuf>, device: B::Device) -> Self {
        let model = model.to_device(&device);
        Self { model, store: CheckpointStore::new(model_dir), device }
    }

    /// input: [batch, timesteps, features] → one prediction row per sample, in input order.
    pub fn predict(&mut self, input: Tensor<B, 3>, use_best: bool) -> EngineResult<Vec<Vec<f32>>> {
        if use_best {
            let bundle = self.store.load_best()?;
            self.model = bundle.restore_model::<B, M>(self.model.clone(), &self.device)?;
            tracing::info!(
                "Restored best checkpoint (epoch {}, metric {:.6})",
                bundle.meta.epoch, bundle.meta.metric,
            );
        }

        let contract = self.model.contract();
        contract.check_input(input.dims())?;
        let output = self.model.forward(input.to_device(&self.device));
        Ok(into_rows(tensor_values(output)?, contract.outputs))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use burn::module::AutodiffModule;
    use burn::optim::AdamConfig;

    use crate::domain::errors::EngineError;
    use crate::domain::schedule::StepDecay;
    use crate::domain::traits::LrScheduler;
    use crate::infra::checkpoint::CheckpointBundle;
    use crate::ml::model::{ConvRnn, ConvRnnConfig};

    type TrainBackend = Autodiff<NdArray>;
    type TestBackend  = NdArray;

    fn config() -> ConvRnnConfig {
        ConvRnnConfig::with_topology(2, 4, 2, &[2, 3], &[1, 2], 3, 3)
    }

    fn window_input(device: &NdArrayDevice) -> Tensor<TestBackend, 3> {
        Tensor::<TestBackend, 3>::from_data(
            burn::tensor::TensorData::new((0..24).map(|v| v as f32 * 0.05).collect::<Vec<f32>>(), [3, 4, 2]),
            device,
        )
    }

    #[test]
    fn test_use_best_without_checkpoint_is_not_found() {
        let dir    = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::Cpu;
        let model: ConvRnn<TestBackend> = config().init(&device);
        let mut inferencer = Inferencer::<TestBackend, _>::new(model, dir.path(), device);

        assert!(matches!(
            inferencer.predict(window_input(&device), true),
            Err(EngineError::CheckpointNotFound { .. })
        ));
        // without use_best the live weights are used
        assert_eq!(inferencer.predict(window_input(&device), false).unwrap().len(), 3);
    }

    #[test]
    fn test_use_best_restores_saved_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::Cpu;

        let trained: ConvRnn<TrainBackend> = config().init(&device);
        let optim = AdamConfig::new().with_epsilon(1e-8).init::<TrainBackend, ConvRnn<TrainBackend>>();
        let bundle = CheckpointBundle::capture::<TrainBackend, _, _>(
            &trained, &optim, StepDecay::new(1e-3, 20, 0.9).state(), 0, 0.1,
        )
        .unwrap();
        CheckpointStore::new(dir.path()).save_best(&bundle).unwrap();

        let expected = into_rows(tensor_values(trained.valid().forward(window_input(&device))).unwrap(), 2);

        let untrained: ConvRnn<TestBackend> = config().init(&device);
        let mut inferencer = Inferencer::<TestBackend, _>::new(untrained, dir.path(), device);
        let first = inferencer.predict(window_input(&device), true).unwrap();
        assert_eq!(first, expected);

        // restored weights stay in place for later calls
        let again = inferencer.predict(window_input(&device), false).unwrap();
        assert_eq!(again, expected);
    }

    #[test]
    fn test_wrong_window_length_is_shape_mismatch() {
        let dir    = tempfile::tempdir().unwrap();
        let device = NdArrayDevice::Cpu;
        let model: ConvRnn<TestBackend> = config().init(&device);
        let mut inferencer = Inferencer::<TestBackend, _>::new(model, dir.path(), device);

        let short = Tensor::<TestBackend, 3>::zeros([1, 3, 2], &device);
        assert!(matches!(
            inferencer.predict(short, false),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }
}
