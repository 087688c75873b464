//! Trained model bundle and its on-disk artifact
//!
//! The normalizer, architecture, feature layout and classifier weights are
//! persisted together in one versioned JSON file, so they can never drift
//! apart.

use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::features::FEATURE_NAMES;
use crate::model::mlp::MultiTaskModel;
use crate::training::normalizer::FeatureNormalizer;
use crate::{FeatureConfig, FootyError, InferenceBackend, ModelConfig, Result};

/// Bumped whenever the artifact layout or feature semantics change
pub const SCHEMA_VERSION: u32 = 2;

/// A fitted normalizer and classifier, immutable once built
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: MultiTaskModel<InferenceBackend>,
    pub normalizer: FeatureNormalizer,
    pub model_config: ModelConfig,
    /// Feature settings the model was trained with
    pub feature_config: FeatureConfig,
    /// Samples used for training, validation and test together
    pub sample_count: usize,
    pub created_at: NaiveDateTime,
}

/// Serialized form of a [`TrainedModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub created_at: NaiveDateTime,
    pub feature_names: Vec<String>,
    pub model_config: ModelConfig,
    pub feature_config: FeatureConfig,
    pub normalizer: FeatureNormalizer,
    pub sample_count: usize,
    /// Classifier weights (burn binary record), base64 in the JSON
    #[serde(with = "base64_bytes")]
    pub weights: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

impl ModelArtifact {
    pub fn from_model(trained: &TrainedModel) -> Result<Self> {
        Ok(ModelArtifact {
            schema_version: SCHEMA_VERSION,
            created_at: trained.created_at,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model_config: trained.model_config.clone(),
            feature_config: trained.feature_config.clone(),
            normalizer: trained.normalizer.clone(),
            sample_count: trained.sample_count,
            weights: trained.model.to_bytes()?,
        })
    }

    /// Rebuild the model, rejecting artifacts this build cannot interpret
    pub fn into_model(self) -> Result<TrainedModel> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(FootyError::IncompatibleArtifact(format!(
                "schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.feature_names.len() != FEATURE_NAMES.len()
            || self.feature_names.iter().zip(FEATURE_NAMES.iter()).any(|(a, b)| a != b)
        {
            return Err(FootyError::IncompatibleArtifact(
                "feature layout differs from this build".to_string(),
            ));
        }
        self.normalizer.validate()?;

        let device = <InferenceBackend as Backend>::Device::default();
        let model = MultiTaskModel::from_bytes(&device, &self.model_config, self.weights)?;

        Ok(TrainedModel {
            model,
            normalizer: self.normalizer,
            model_config: self.model_config,
            feature_config: self.feature_config,
            sample_count: self.sample_count,
            created_at: self.created_at,
        })
    }
}

/// Location of a saved artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub path: PathBuf,
}

/// File-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ArtifactStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn handle(&self) -> ArtifactHandle {
        ArtifactHandle {
            path: self.path.clone(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the artifact atomically (temp file + rename); a failed write leaves
    /// neither the temp file nor a partial artifact behind
    pub fn save(&self, trained: &TrainedModel) -> Result<ArtifactHandle> {
        let artifact = ModelArtifact::from_model(trained)?;
        let json = serde_json::to_vec(&artifact)
            .map_err(|e| FootyError::Model(format!("Failed to serialize artifact: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = std::fs::write(&tmp, json).and_then(|_| std::fs::rename(&tmp, &self.path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::info!("Model saved to {}", self.path.display());
        Ok(self.handle())
    }

    /// Read artifact metadata and weights without rebuilding the model
    pub fn read(&self, handle: &ArtifactHandle) -> Result<ModelArtifact> {
        let bytes = match std::fs::read(&handle.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FootyError::ArtifactNotFound(handle.path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| FootyError::IncompatibleArtifact(format!("{}: {}", handle.path.display(), e)))
    }

    pub fn load(&self, handle: &ArtifactHandle) -> Result<TrainedModel> {
        let trained = self.read(handle)?.into_model()?;
        log::info!(
            "Loaded model from {} (trained {} on {} samples)",
            handle.path.display(),
            trained.created_at.format("%Y-%m-%d %H:%M"),
            trained.sample_count
        );
        Ok(trained)
    }
}
