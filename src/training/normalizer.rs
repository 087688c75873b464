//! Per-feature z-score normalization
//!
//! Fitted on the training split only and persisted with the model, so
//! inference applies exactly the statistics the classifier was trained on.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::data::FootyDataset;
use crate::features::FeatureVector;
use crate::{FootyError, Result};

/// Floor for the standard deviation of constant features
const MIN_STD: f32 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalizer {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureNormalizer {
    /// Identity normalizer (mean 0, std 1)
    pub fn identity() -> Self {
        FeatureNormalizer {
            mean: vec![0.0; FeatureVector::DIM],
            std: vec![1.0; FeatureVector::DIM],
        }
    }

    /// Compute from training dataset
    pub fn fit(dataset: &FootyDataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(FootyError::InsufficientData { found: 0, required: 1 });
        }

        let mut sum = vec![0.0f64; FeatureVector::DIM];
        let mut sum_sq = vec![0.0f64; FeatureVector::DIM];

        for sample in dataset.samples() {
            for (j, v) in sample.features.iter().enumerate() {
                sum[j] += *v as f64;
                sum_sq[j] += (*v as f64) * (*v as f64);
            }
        }

        let n = dataset.len() as f64;
        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();
        let std: Vec<f32> = sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| ((sq / n - m * m).max(0.0).sqrt() as f32).max(MIN_STD))
            .collect();

        Ok(FeatureNormalizer {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            std,
        })
    }

    /// Check dimensions after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != FeatureVector::DIM || self.std.len() != FeatureVector::DIM {
            return Err(FootyError::IncompatibleArtifact(format!(
                "normalizer has {}/{} values, expected {}",
                self.mean.len(),
                self.std.len(),
                FeatureVector::DIM
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(FootyError::IncompatibleArtifact(
                "normalizer has a non-positive standard deviation".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalize a single feature vector
    pub fn transform(&self, values: &[f32; FeatureVector::DIM]) -> [f32; FeatureVector::DIM] {
        let mut out = [0.0; FeatureVector::DIM];
        for (j, v) in values.iter().enumerate() {
            out[j] = (v - self.mean[j]) / self.std[j];
        }
        out
    }

    /// Normalize a feature tensor using z-score: (x - mean) / std
    pub fn normalize<B: Backend>(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = features.device();
        let mean_tensor = Tensor::<B, 1>::from_floats(self.mean.as_slice(), &device).unsqueeze_dim(0);
        let std_tensor = Tensor::<B, 1>::from_floats(self.std.as_slice(), &device).unsqueeze_dim(0);

        (features - mean_tensor) / std_tensor
    }
}
