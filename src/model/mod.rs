//! Neural network architecture and model persistence

pub mod artifact;
pub mod mlp;

pub use artifact::{ArtifactHandle, ArtifactStore, ModelArtifact, TrainedModel, SCHEMA_VERSION};
pub use mlp::{MultiTaskModel, MultiTaskOutput};
