// ============================================================
// Layer 4 — Series Batcher / Batch Source
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<SeriesSample>
// into one SeriesBatch:
//
//   Input:  N samples, each T*F input values and H target values
//   Output: SeriesBatch { input: [N, T, F], target: [N, H] }
//
// We flatten all inputs into one Vec, then let TensorData carry
// the shape:  [s1_t1_f1, s1_t1_f2, ..., sN_tT_fF] → [N, T, F]
//
// Sample widths were already checked when the SeriesDataset was
// built, so batching itself cannot fail.
//
// BatchSource is what the training loop and validation runner
// consume: a finite, ordered, restartable sequence of batches.
// SeriesLoader backs it with Burn's DataLoader, built without
// shuffling so every `iter()` replays dataset order from the
// first sample (the last batch may be smaller).
//
// Reference: Burn Book §4 (Batcher, DataLoader)

use burn::{
    data::dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
    prelude::*,
    tensor::TensorData,
};
use std::sync::Arc;

pub use crate::data::dataset::WindowShape;
use crate::data::dataset::{SeriesDataset, SeriesSample};
use crate::domain::errors::{EngineError, EngineResult};

/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct SeriesBatch<B: Backend> {
    /// Shape: [batch, timesteps, features]
    pub input: Tensor<B, 3>,

    /// Shape: [batch, horizon]
    pub target: Tensor<B, 2>,
}

impl<B: Backend> SeriesBatch<B> {
    pub fn size(&self) -> usize {
        self.input.dims()[0]
    }
}

/// Finite, ordered, restartable sequence of (input, target) batches.
pub trait BatchSource<B: Backend> {
    /// Start a new pass from the first sample.
    fn batches(&self) -> Box<dyn Iterator<Item = SeriesBatch<B>> + '_>;
}

// ─── SeriesBatcher ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SeriesBatcher {
    shape: WindowShape,
}

impl SeriesBatcher {
    pub fn new(shape: WindowShape) -> Self {
        Self { shape }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items, device) with each mini-batch.
impl<B: Backend> Batcher<B, SeriesSample, SeriesBatch<B>> for SeriesBatcher {
    fn batch(&self, items: Vec<SeriesSample>, device: &B::Device) -> SeriesBatch<B> {
        let WindowShape { timesteps, features, horizon } = self.shape;
        let n = items.len();

        let input_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.input.iter().copied())
            .collect();
        let target_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.target.iter().copied())
            .collect();

        let input = Tensor::<B, 3>::from_data(
            TensorData::new(input_flat, [n, timesteps, features]),
            device,
        );
        let target = Tensor::<B, 2>::from_data(
            TensorData::new(target_flat, [n, horizon]),
            device,
        );

        SeriesBatch { input, target }
    }
}

// ─── SeriesLoader ─────────────────────────────────────────────────────────────

/// Ordered batches of one dataset on one device.
pub struct SeriesLoader<B: Backend> {
    loader: Arc<dyn DataLoader<B, SeriesBatch<B>>>,
}

impl<B: Backend> SeriesLoader<B> {
    pub fn new(dataset: SeriesDataset, batch_size: usize, device: &B::Device) -> Self {
        let batcher = SeriesBatcher::new(dataset.shape());
        let loader  = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size.max(1))
            .num_workers(1)
            .set_device(device.clone())
            .build(dataset);
        Self { loader }
    }
}

impl<B: Backend> BatchSource<B> for SeriesLoader<B> {
    fn batches(&self) -> Box<dyn Iterator<Item = SeriesBatch<B>> + '_> {
        Box::new(self.loader.iter())
    }
}

/// Build an inference input tensor from raw windows.
pub fn input_tensor<B: Backend>(
    windows: &[Vec<f32>],
    shape:   WindowShape,
    device:  &B::Device,
) -> EngineResult<Tensor<B, 3>> {
    let expected = shape.timesteps * shape.features;
    if let Some(bad) = windows.iter().find(|w| w.len() != expected) {
        return Err(EngineError::shape(
            "inference window",
            &[shape.timesteps, shape.features],
            &[bad.len()],
        ));
    }
    let flat: Vec<f32> = windows.iter().flat_map(|w| w.iter().copied()).collect();
    Ok(Tensor::<B, 3>::from_data(
        TensorData::new(flat, [windows.len(), shape.timesteps, shape.features]),
        device,
    ))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    type TestBackend = NdArray;

    const SHAPE: WindowShape = WindowShape { timesteps: 2, features: 2, horizon: 1 };

    fn sample(v: f32) -> SeriesSample {
        SeriesSample { input: vec![v; 4], target: vec![v] }
    }

    fn loader(n: usize, batch_size: usize) -> SeriesLoader<TestBackend> {
        let samples = (0..n).map(|i| sample(i as f32)).collect();
        SeriesLoader::new(SeriesDataset::new(samples, SHAPE).unwrap(), batch_size, &NdArrayDevice::Cpu)
    }

    #[test]
    fn test_batch_sizes_follow_dataset_order() {
        let sizes: Vec<usize> = loader(8, 3).batches().map(|batch| batch.size()).collect();
        assert_eq!(sizes, vec![3, 3, 2]);
    }

    #[test]
    fn test_batches_restart_each_pass() {
        let l = loader(5, 2);
        for _ in 0..2 {
            let targets: Vec<f32> = l
                .batches()
                .flat_map(|b| b.target.into_data().to_vec::<f32>().unwrap())
                .collect();
            assert_eq!(targets, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        }
    }

    #[test]
    fn test_tensor_layout() {
        let batch: SeriesBatch<TestBackend> =
            SeriesBatcher::new(SHAPE).batch(vec![sample(0.0), sample(1.0)], &NdArrayDevice::Cpu);
        assert_eq!(batch.input.dims(), [2, 2, 2]);
        assert_eq!(batch.target.dims(), [2, 1]);
        let input: Vec<f32> = batch.input.into_data().to_vec().unwrap();
        assert_eq!(&input[4..], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_input_tensor_rejects_short_window() {
        let device = NdArrayDevice::Cpu;
        let result = input_tensor::<TestBackend>(&[vec![0.0; 4], vec![0.0; 2]], SHAPE, &device);
        assert!(result.is_err());
    }
}
