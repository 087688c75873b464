//! Model training
//!
//! Normalization, training loop, loss functions, metrics and background jobs.

pub mod job;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod trainer;

pub use job::{CancelToken, ProgressReporter, TrainingHandle, TrainingJob, TrainingProgress, TrainingState};
pub use metrics::{Metrics, TrainingHistory};
pub use normalizer::FeatureNormalizer;
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use trainer::{MultiTaskLoss, MultiTaskTrainer};
