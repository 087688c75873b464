//! Training metrics and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-batch loss values, already reduced to scalars
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLoss {
    pub total: f32,
    pub outcome: f32,
    pub btts: f32,
    pub over_under: f32,
}

/// Correct predictions within a batch, per head
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchHits {
    pub outcome: usize,
    pub btts: usize,
    pub over_under: usize,
}

/// Metrics accumulated during training/evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Sample-weighted sums of the batch mean losses
    pub total_loss: f64,
    pub outcome_loss: f64,
    pub btts_loss: f64,
    pub over_under_loss: f64,
    pub correct_outcomes: usize,
    pub correct_btts: usize,
    pub correct_over_under: usize,
    /// Total predictions
    pub total_predictions: usize,
    /// Number of batches accumulated
    pub batch_count: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, loss: BatchLoss, hits: BatchHits, batch_size: usize) {
        let n = batch_size as f64;
        self.total_loss += loss.total as f64 * n;
        self.outcome_loss += loss.outcome as f64 * n;
        self.btts_loss += loss.btts as f64 * n;
        self.over_under_loss += loss.over_under as f64 * n;
        self.correct_outcomes += hits.outcome;
        self.correct_btts += hits.btts;
        self.correct_over_under += hits.over_under;
        self.total_predictions += batch_size;
        self.batch_count += 1;
    }

    fn per_sample(&self, sum: f64) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            sum / self.total_predictions as f64
        }
    }

    fn ratio(&self, correct: usize) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            correct as f64 / self.total_predictions as f64
        }
    }

    /// Get average total loss
    pub fn avg_loss(&self) -> f64 {
        self.per_sample(self.total_loss)
    }

    pub fn avg_outcome_loss(&self) -> f64 {
        self.per_sample(self.outcome_loss)
    }

    pub fn avg_btts_loss(&self) -> f64 {
        self.per_sample(self.btts_loss)
    }

    pub fn avg_over_under_loss(&self) -> f64 {
        self.per_sample(self.over_under_loss)
    }

    /// 1X2 accuracy (argmax of the outcome head)
    pub fn outcome_accuracy(&self) -> f64 {
        self.ratio(self.correct_outcomes)
    }

    pub fn btts_accuracy(&self) -> f64 {
        self.ratio(self.correct_btts)
    }

    pub fn over_under_accuracy(&self) -> f64 {
        self.ratio(self.correct_over_under)
    }

    /// Merge another metrics instance
    pub fn merge(&mut self, other: &Metrics) {
        self.total_loss += other.total_loss;
        self.outcome_loss += other.outcome_loss;
        self.btts_loss += other.btts_loss;
        self.over_under_loss += other.over_under_loss;
        self.correct_outcomes += other.correct_outcomes;
        self.correct_btts += other.correct_btts;
        self.correct_over_under += other.correct_over_under;
        self.total_predictions += other.total_predictions;
        self.batch_count += other.batch_count;
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss: {:.4} (1x2: {:.4}, btts: {:.4}, o/u: {:.4}) | Acc 1x2: {:.1}% btts: {:.1}% o/u: {:.1}%",
            self.avg_loss(),
            self.avg_outcome_loss(),
            self.avg_btts_loss(),
            self.avg_over_under_loss(),
            self.outcome_accuracy() * 100.0,
            self.btts_accuracy() * 100.0,
            self.over_under_accuracy() * 100.0
        )
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub val_outcome_accuracies: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record metrics for an epoch. Returns true if validation loss improved.
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: &Metrics) -> bool {
        self.train_losses.push(train.avg_loss());
        self.val_losses.push(val.avg_loss());
        self.val_outcome_accuracies.push(val.outcome_accuracy());

        if val.avg_loss() < self.best_val_loss {
            self.best_val_loss = val.avg_loss();
            self.best_epoch = epoch;
            true
        } else {
            false
        }
    }

    pub fn epochs_run(&self) -> usize {
        self.val_losses.len()
    }

    /// True once `patience` epochs have passed without improvement
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if self.val_losses.is_empty() || patience == 0 {
            return false;
        }
        let current_epoch = self.val_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }
}
