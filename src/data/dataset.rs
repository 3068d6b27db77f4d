use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{EngineError, EngineResult};

/// One supervised window.
/// `input` is row-major [timesteps][features]; `target` holds `horizon` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSample {
    pub input:  Vec<f32>,
    pub target: Vec<f32>,
}

/// Dimensions every sample must agree with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowShape {
    pub timesteps: usize,
    pub features:  usize,
    pub horizon:   usize,
}

/// Samples whose widths have all been checked against one `WindowShape`.
#[derive(Debug, Clone)]
pub struct SeriesDataset {
    samples: Vec<SeriesSample>,
    shape:   WindowShape,
}

impl SeriesDataset {
    pub fn new(samples: Vec<SeriesSample>, shape: WindowShape) -> EngineResult<Self> {
        let WindowShape { timesteps, features, horizon } = shape;
        for sample in &samples {
            if sample.input.len() != timesteps * features {
                return Err(EngineError::shape(
                    "sample input",
                    &[timesteps, features],
                    &[sample.input.len()],
                ));
            }
            if sample.target.len() != horizon {
                return Err(EngineError::shape(
                    "sample target",
                    &[horizon],
                    &[sample.target.len()],
                ));
            }
        }
        Ok(Self { samples, shape })
    }

    pub fn shape(&self) -> WindowShape { self.shape }
}

impl Dataset<SeriesSample> for SeriesDataset {
    fn get(&self, index: usize) -> Option<SeriesSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
