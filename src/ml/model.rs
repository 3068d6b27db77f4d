use burn::{
    module::{ModuleVisitor, Param},
    nn::{
        conv::{Conv1d, Conv1dConfig},
        gru::{Gru, GruConfig},
        pool::{AvgPool1d, AvgPool1dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::SeriesBatch;
use crate::domain::errors::{EngineError, EngineResult};

// ─── Model adapter ────────────────────────────────────────────────────────────

/// Dimensions a regressor accepts and produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeContract {
    pub timesteps: usize,
    pub features:  usize,
    pub outputs:   usize,
}

impl ShapeContract {
    pub fn check_input(&self, dims: [usize; 3]) -> EngineResult<()> {
        let [batch, timesteps, features] = dims;
        if timesteps != self.timesteps || features != self.features {
            return Err(EngineError::shape(
                "model input",
                &[batch, self.timesteps, self.features],
                &dims,
            ));
        }
        Ok(())
    }

    pub fn check_batch<B: Backend>(&self, batch: &SeriesBatch<B>) -> EngineResult<()> {
        self.check_input(batch.input.dims())?;
        let target = batch.target.dims();
        let expected = [batch.size(), self.outputs];
        if target != expected {
            return Err(EngineError::shape("batch target", &expected, &target));
        }
        Ok(())
    }
}

/// A burn module that maps `[batch, timesteps, features]` to `[batch, outputs]`.
///
/// Everything else the engine needs (parameters, device moves, state
/// capture/restore, eval mode) comes from `Module` / `AutodiffModule`.
pub trait Regressor<B: Backend>: Module<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2>;

    fn contract(&self) -> ShapeContract;
}

// ─── ConvRNN configuration ────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct BranchSpec {
    /// Average-pooling factor applied before the convolutions (1 = none).
    pub pool:        usize,
    pub kernel_size: usize,
    pub channels:    usize,
    pub units:       usize,
}

#[derive(Config, Debug)]
pub struct ConvRnnConfig {
    pub features:  usize,
    pub timesteps: usize,
    pub outputs:   usize,
    pub branches:  Vec<BranchSpec>,
}

/// Default topology: three branches at full, half and quarter resolution.
pub const DEFAULT_KERNEL_SIZES: [usize; 3] = [7, 5, 3];
pub const DEFAULT_POOLS:        [usize; 3] = [1, 2, 4];
pub const DEFAULT_CHANNELS:     usize      = 32;
pub const DEFAULT_UNITS:        usize      = 32;

impl ConvRnnConfig {
    pub fn with_topology(
        features:     usize,
        timesteps:    usize,
        outputs:      usize,
        kernel_sizes: &[usize],
        pools:        &[usize],
        channels:     usize,
        units:        usize,
    ) -> Self {
        let branches = kernel_sizes
            .iter()
            .zip(pools)
            .map(|(&kernel_size, &pool)| BranchSpec::new(pool, kernel_size, channels, units))
            .collect();
        Self::new(features, timesteps, outputs, branches)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.features == 0 || self.timesteps == 0 || self.outputs == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "model dimensions must be positive (features={}, timesteps={}, outputs={})",
                self.features, self.timesteps, self.outputs,
            )));
        }
        if self.branches.is_empty() {
            return Err(EngineError::InvalidConfig("model needs at least one branch".into()));
        }
        for (i, b) in self.branches.iter().enumerate() {
            if b.pool == 0 || b.kernel_size == 0 || b.channels == 0 || b.units == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "branch {i}: pool, kernel_size, channels and units must be positive"
                )));
            }
            if self.timesteps / b.pool == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "branch {i}: pool factor {} leaves no timesteps out of {}",
                    b.pool, self.timesteps,
                )));
            }
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvRnn<B> {
        let branches: Vec<ConvBranch<B>> = self
            .branches
            .iter()
            .map(|spec| spec.init(self.features, device))
            .collect();
        let hidden: usize = self.branches.iter().map(|b| b.units).sum();
        let head = LinearConfig::new(hidden, self.outputs).init(device);
        let skip = LinearConfig::new(self.features * self.timesteps, self.outputs).init(device);
        ConvRnn {
            branches, head, skip,
            timesteps: self.timesteps,
            features:  self.features,
            outputs:   self.outputs,
        }
    }
}

impl BranchSpec {
    fn init<B: Backend>(&self, features: usize, device: &B::Device) -> ConvBranch<B> {
        let pool = (self.pool > 1).then(|| {
            AvgPool1dConfig::new(self.pool).with_stride(self.pool).init()
        });
        let conv_in  = Conv1dConfig::new(features, self.channels, self.kernel_size).init(device);
        let conv_out = Conv1dConfig::new(self.channels, self.channels, self.kernel_size).init(device);
        let gru      = GruConfig::new(self.channels, self.units, true).init(device);
        ConvBranch { pool, conv_in, conv_out, gru, kernel_size: self.kernel_size }
    }
}

// ─── ConvRNN ──────────────────────────────────────────────────────────────────

/// One resolution of the series: pool → causal conv ×2 → GRU → last state.
#[derive(Module, Debug)]
pub struct ConvBranch<B: Backend> {
    pub pool:        Option<AvgPool1d>,
    pub conv_in:     Conv1d<B>,
    pub conv_out:    Conv1d<B>,
    pub gru:         Gru<B>,
    pub kernel_size: usize,
}

impl<B: Backend> ConvBranch<B> {
    /// x: [batch, features, time] → [batch, units]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = match &self.pool {
            Some(pool) => pool.forward(x),
            None       => x,
        };
        let y = relu(self.conv_in.forward(causal_pad(x, self.kernel_size)));
        let y = relu(self.conv_out.forward(causal_pad(y, self.kernel_size)));

        // GRU expects [batch, time, channels]
        let states = self.gru.forward(y.swap_dims(1, 2), None);
        let [batch, time, units] = states.dims();
        states
            .slice([0..batch, time - 1..time, 0..units])
            .reshape([batch, units])
    }
}

/// Left zero-padding so output step t only sees inputs up to t.
fn causal_pad<B: Backend>(x: Tensor<B, 3>, kernel_size: usize) -> Tensor<B, 3> {
    if kernel_size <= 1 {
        return x;
    }
    let [batch, channels, _] = x.dims();
    let zeros = Tensor::<B, 3>::zeros([batch, channels, kernel_size - 1], &x.device());
    Tensor::cat(vec![zeros, x], 2)
}

#[derive(Module, Debug)]
pub struct ConvRnn<B: Backend> {
    pub branches:  Vec<ConvBranch<B>>,
    pub head:      Linear<B>,
    /// Linear path straight from the flattened window to the outputs.
    pub skip:      Linear<B>,
    pub timesteps: usize,
    pub features:  usize,
    pub outputs:   usize,
}

impl<B: Backend> Regressor<B> for ConvRnn<B> {
    /// input: [batch, timesteps, features] → [batch, outputs]
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, timesteps, features] = input.dims();

        // Conv1d wants channels first: [batch, features, time]
        let channels_first = input.clone().swap_dims(1, 2);
        let hidden: Vec<Tensor<B, 2>> = self
            .branches
            .iter()
            .map(|branch| branch.forward(channels_first.clone()))
            .collect();
        let deep = self.head.forward(Tensor::cat(hidden, 1));

        let flat = channels_first.reshape([batch, features * timesteps]);
        deep + self.skip.forward(flat)
    }

    fn contract(&self) -> ShapeContract {
        ShapeContract {
            timesteps: self.timesteps,
            features:  self.features,
            outputs:   self.outputs,
        }
    }
}

// ─── Parameter shapes ─────────────────────────────────────────────────────────

/// Name and dimensions of one float parameter, in visit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamShape {
    pub name: String,
    pub dims: Vec<usize>,
}

struct ShapeCollector {
    path:   Vec<String>,
    shapes: Vec<ParamShape>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let name = if self.path.is_empty() {
            format!("param{}", self.shapes.len())
        } else {
            self.path.join(".")
        };
        self.shapes.push(ParamShape { name, dims: param.val().dims().to_vec() });
    }
}

pub fn parameter_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamShape> {
    let mut collector = ShapeCollector { path: Vec::new(), shapes: Vec::new() };
    module.visit(&mut collector);
    collector.shapes
}

/// Compare shapes stored with a checkpoint against a live model, position by position.
pub fn check_parameter_shapes(live: &[ParamShape], stored: &[ParamShape]) -> EngineResult<()> {
    if live.len() != stored.len() {
        return Err(EngineError::shape("parameter count", &[live.len()], &[stored.len()]));
    }
    for (l, s) in live.iter().zip(stored) {
        if l.dims != s.dims {
            return Err(EngineError::shape(format!("parameter '{}'", l.name), &l.dims, &s.dims));
        }
    }
    Ok(())
}
