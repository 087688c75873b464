//! Multi-task MLP classifier
//!
//! Architecture: Input(22) → [Linear → ReLU → Dropout] × N (default 64-32-16)
//!                         → outcome_head(3), btts_head(1), over_head(1)

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::activation::{relu, sigmoid, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::features::FeatureVector;
use crate::{FootyError, ModelConfig, Result};

/// Raw head outputs
#[derive(Debug, Clone)]
pub struct MultiTaskOutput<B: Backend> {
    /// Outcome logits [batch, 3] (home, draw, away) - apply softmax
    pub outcome_logits: Tensor<B, 2>,
    /// BTTS logit [batch, 1] - apply sigmoid
    pub btts_logit: Tensor<B, 2>,
    /// Over 2.5 logit [batch, 1] - apply sigmoid
    pub over_logit: Tensor<B, 2>,
}

impl<B: Backend> MultiTaskOutput<B> {
    pub fn outcome_probs(&self) -> Tensor<B, 2> {
        softmax(self.outcome_logits.clone(), 1)
    }

    pub fn btts_prob(&self) -> Tensor<B, 2> {
        sigmoid(self.btts_logit.clone())
    }

    pub fn over_prob(&self) -> Tensor<B, 2> {
        sigmoid(self.over_logit.clone())
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Shared trunk with three classification heads
#[derive(Module, Debug)]
pub struct MultiTaskModel<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    outcome_head: Linear<B>,
    btts_head: Linear<B>,
    over_head: Linear<B>,
}

impl<B: Backend> MultiTaskModel<B> {
    /// Create a new model with freshly initialized weights
    pub fn new(device: &B::Device, config: &ModelConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = FeatureVector::DIM;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim, config.dropout));
            in_dim = out_dim;
        }

        MultiTaskModel {
            hidden,
            outcome_head: LinearConfig::new(in_dim, 3).init(device),
            btts_head: LinearConfig::new(in_dim, 1).init(device),
            over_head: LinearConfig::new(in_dim, 1).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `features` - Normalized features [batch, 22]
    pub fn forward(&self, features: Tensor<B, 2>) -> MultiTaskOutput<B> {
        let mut x = features;
        for block in &self.hidden {
            x = block.forward(x);
        }

        MultiTaskOutput {
            outcome_logits: self.outcome_head.forward(x.clone()),
            btts_logit: self.btts_head.forward(x.clone()),
            over_logit: self.over_head.forward(x),
        }
    }

    /// Serialize weights to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.clone().into_record(), ())
            .map_err(|e| FootyError::Model(format!("Failed to serialize weights: {}", e)))
    }

    /// Rebuild a model from serialized weights
    ///
    /// The architecture comes from `config`; weights that do not fit it are
    /// rejected.
    pub fn from_bytes(device: &B::Device, config: &ModelConfig, bytes: Vec<u8>) -> Result<Self> {
        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(bytes, device)
            .map_err(|e| FootyError::IncompatibleArtifact(format!("Failed to load weights: {}", e)))?;
        Ok(Self::new(device, config).load_record(record))
    }
}
