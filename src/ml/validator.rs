// ============================================================
// Layer 5 — Validation Runner
// ============================================================
// One full pass over a batch source in inference mode.
//
// The caller passes `model.valid()`, i.e. the module on the
// inner (non-autodiff) backend, so no gradient graph is built
// and dropout-style layers run in eval mode. The runner never
// touches the optimizer.

use burn::prelude::*;

use crate::data::batcher::BatchSource;
use crate::domain::errors::{EngineError, EngineResult};
use crate::ml::metric::mean_squared_error;
use crate::ml::model::Regressor;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metric:      f64,
    /// One row of `outputs` values per sample, in batch order.
    pub predictions: Vec<Vec<f32>>,
    pub targets:     Vec<Vec<f32>>,
    pub batches:     usize,
}

pub fn evaluate<B, M, S>(model: &M, source: &S) -> EngineResult<Evaluation>
where
    B: Backend,
    M: Regressor<B>,
    S: BatchSource<B> + ?Sized,
{
    let contract = model.contract();
    let mut predictions = Vec::new();
    let mut targets     = Vec::new();
    let mut batches     = 0usize;

    for batch in source.batches() {
        contract.check_batch(&batch)?;
        let output = model.forward(batch.input);
        predictions.extend(tensor_values(output)?);
        targets.extend(tensor_values(batch.target)?);
        batches += 1;
    }

    if batches == 0 {
        return Err(EngineError::EmptyBatches("validation"));
    }

    let metric = mean_squared_error(&predictions, &targets)?;
    Ok(Evaluation {
        metric,
        predictions: into_rows(predictions, contract.outputs),
        targets:     into_rows(targets, contract.outputs),
        batches,
    })
}

pub(crate) fn tensor_values<B: Backend, const D: usize>(t: Tensor<B, D>) -> EngineResult<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| EngineError::TensorData(format!("{e:?}")))
}

pub(crate) fn into_rows(flat: Vec<f32>, width: usize) -> Vec<Vec<f32>> {
    flat.chunks(width.max(1)).map(<[f32]>::to_vec).collect()
}
