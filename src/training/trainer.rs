//! Training loop for the multi-task model

use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::{log_softmax, sigmoid};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{FixtureBatch, FixtureBatcher, FootyDataset};
use crate::model::mlp::{MultiTaskModel, MultiTaskOutput};
use crate::training::job::{CancelToken, ProgressReporter};
use crate::training::metrics::{BatchHits, BatchLoss, Metrics, TrainingHistory};
use crate::training::normalizer::FeatureNormalizer;
use crate::{FootyError, LossConfig, Result, TrainingConfig};

/// Loss components for one batch
pub struct LossTerms<B: Backend> {
    pub total: Tensor<B, 1>,
    pub outcome: Tensor<B, 1>,
    pub btts: Tensor<B, 1>,
    pub over_under: Tensor<B, 1>,
}

impl<B: Backend> LossTerms<B> {
    pub fn to_scalars(&self) -> BatchLoss {
        BatchLoss {
            total: self.total.clone().into_scalar().elem(),
            outcome: self.outcome.clone().into_scalar().elem(),
            btts: self.btts.clone().into_scalar().elem(),
            over_under: self.over_under.clone().into_scalar().elem(),
        }
    }
}

/// Weighted sum of categorical cross-entropy (1X2) and two binary
/// cross-entropies (BTTS, over 2.5)
#[derive(Debug, Clone)]
pub struct MultiTaskLoss {
    weights: LossConfig,
}

impl MultiTaskLoss {
    pub fn new(weights: LossConfig) -> Self {
        MultiTaskLoss { weights }
    }

    pub fn forward<B: Backend>(&self, output: &MultiTaskOutput<B>, batch: &FixtureBatch<B>) -> LossTerms<B> {
        let outcome = Self::cross_entropy(output.outcome_logits.clone(), batch.outcome.clone());
        let btts = Self::binary_cross_entropy(output.btts_logit.clone(), batch.btts.clone());
        let over_under = Self::binary_cross_entropy(output.over_logit.clone(), batch.over_2_5.clone());

        let total = outcome.clone() * self.weights.outcome_weight
            + btts.clone() * self.weights.btts_weight
            + over_under.clone() * self.weights.over_under_weight;

        LossTerms {
            total,
            outcome,
            btts,
            over_under,
        }
    }

    /// Cross-entropy against one-hot targets, via log-softmax
    fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let log_probs = log_softmax(logits, 1);
        (targets * log_probs).sum_dim(1).mean().neg()
    }

    /// Binary cross-entropy on clamped sigmoid probabilities
    fn binary_cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let eps = 1e-7;
        let probs = sigmoid(logits).clamp(eps, 1.0 - eps);
        let loss = targets.clone().neg() * probs.clone().log() - (targets.neg() + 1.0) * (probs.neg() + 1.0).log();
        loss.mean()
    }
}

/// Count correct predictions per head
pub fn batch_hits<B: Backend>(output: &MultiTaskOutput<B>, batch: &FixtureBatch<B>) -> BatchHits {
    let logits: Vec<f32> = output.outcome_logits.clone().into_data().iter::<f32>().collect();
    let targets: Vec<f32> = batch.outcome.clone().into_data().iter::<f32>().collect();

    let outcome = logits
        .chunks(3)
        .zip(targets.chunks(3))
        .filter(|(pred, target)| argmax(pred) == argmax(target))
        .count();

    let binary_hits = |logit: &Tensor<B, 2>, target: &Tensor<B, 2>| {
        let probs: Vec<f32> = sigmoid(logit.clone()).into_data().iter::<f32>().collect();
        let targets: Vec<f32> = target.clone().into_data().iter::<f32>().collect();
        probs
            .iter()
            .zip(targets.iter())
            .filter(|(p, t)| (**p >= 0.5) == (**t >= 0.5))
            .count()
    };

    BatchHits {
        outcome,
        btts: binary_hits(&output.btts_logit, &batch.btts),
        over_under: binary_hits(&output.over_logit, &batch.over_2_5),
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
        .0
}

/// Evaluate a model on a whole dataset in one batch
pub fn evaluate<B: Backend>(
    model: &MultiTaskModel<B>,
    normalizer: &FeatureNormalizer,
    loss_fn: &MultiTaskLoss,
    dataset: &FootyDataset,
    device: &B::Device,
) -> Metrics {
    let mut metrics = Metrics::new();
    if dataset.is_empty() {
        return metrics;
    }

    let batch = FixtureBatch::<B>::from_dataset(dataset, device);
    let output = model.forward(normalizer.normalize(batch.features.clone()));
    let loss = loss_fn.forward(&output, &batch);
    metrics.update(loss.to_scalars(), batch_hits(&output, &batch), batch.len());
    metrics
}

/// Trainer for the multi-task model
pub struct MultiTaskTrainer<B: AutodiffBackend> {
    model: MultiTaskModel<B>,
    normalizer: FeatureNormalizer,
    loss_fn: MultiTaskLoss,
    config: TrainingConfig,
    device: B::Device,
    cancel: CancelToken,
    progress: Option<ProgressReporter>,
}

impl<B: AutodiffBackend> MultiTaskTrainer<B> {
    /// Create a new trainer
    pub fn new(
        model: MultiTaskModel<B>,
        normalizer: FeatureNormalizer,
        loss: LossConfig,
        config: TrainingConfig,
        device: B::Device,
    ) -> Self {
        MultiTaskTrainer {
            model,
            normalizer,
            loss_fn: MultiTaskLoss::new(loss),
            config,
            device,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Stop between batches once the token is cancelled
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Train the model, returning the weights of the best validation epoch
    pub fn train(
        mut self,
        train_dataset: FootyDataset,
        val_dataset: FootyDataset,
    ) -> Result<(MultiTaskModel<B::InnerBackend>, TrainingHistory)> {
        if train_dataset.is_empty() {
            return Err(FootyError::InsufficientData {
                found: 0,
                required: self.config.min_samples,
            });
        }

        let batch_size = self.config.batch_size.clamp(1, train_dataset.len());
        let train_loader = DataLoaderBuilder::new(FixtureBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size)
            .shuffle(self.config.seed)
            .build(train_dataset.clone());

        let mut weight_decay = None;
        if self.config.weight_decay > 0.0 {
            weight_decay = Some(WeightDecayConfig::new(self.config.weight_decay as f32));
        }
        let mut optimizer = AdamConfig::new().with_weight_decay(weight_decay).init();

        let mut history = TrainingHistory::new();
        let mut best_model = self.model.clone();
        let epochs = self.config.epochs;

        log::info!(
            "Starting training for {} epochs ({} train, {} validation samples, batch size {})",
            epochs,
            train_dataset.len(),
            val_dataset.len(),
            batch_size
        );

        for epoch in 0..epochs {
            self.check_cancelled()?;

            // Training phase
            let mut train_metrics = Metrics::new();
            for batch in train_loader.iter() {
                self.check_cancelled()?;

                let output = self.model.forward(self.normalizer.normalize(batch.features.clone()));
                let loss = self.loss_fn.forward(&output, &batch);
                train_metrics.update(loss.to_scalars(), batch_hits(&output, &batch), batch.len());

                let grads = loss.total.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = optimizer.step(self.config.learning_rate, self.model.clone(), grads);
            }

            // Validation phase (dropout inactive on the inner backend)
            let val_metrics = if val_dataset.is_empty() {
                train_metrics.clone()
            } else {
                evaluate(
                    &self.model.valid(),
                    &self.normalizer,
                    &self.loss_fn,
                    &val_dataset,
                    &self.device,
                )
            };

            let improved = history.record_epoch(epoch, &train_metrics, &val_metrics);
            log::info!(
                "Epoch {}/{}: Train: {} | Val: {}",
                epoch + 1,
                epochs,
                train_metrics,
                val_metrics
            );

            if improved {
                best_model = self.model.clone();
                log::debug!("  New best model (val_loss: {:.4})", val_metrics.avg_loss());
            }

            if let Some(progress) = &self.progress {
                progress.epoch_finished(epoch + 1, epochs, val_metrics.avg_loss(), history.best_val_loss);
            }

            if history.should_early_stop(self.config.early_stopping_patience) {
                log::info!(
                    "Early stopping at epoch {} (best was epoch {})",
                    epoch + 1,
                    history.best_epoch + 1
                );
                break;
            }
        }

        Ok((best_model.valid(), history))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            log::info!("Training cancelled");
            return Err(FootyError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticLeague;
    use crate::features::FeatureExtractor;
    use crate::ModelConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn batch_from(outcome: [f32; 3], btts: f32, over: f32) -> FixtureBatch<TestBackend> {
        let device = Default::default();
        FixtureBatch {
            features: Tensor::zeros([1, 22], &device),
            outcome: Tensor::<TestBackend, 1>::from_floats(outcome.as_slice(), &device).reshape([1, 3]),
            btts: Tensor::<TestBackend, 1>::from_floats([btts].as_slice(), &device).reshape([1, 1]),
            over_2_5: Tensor::<TestBackend, 1>::from_floats([over].as_slice(), &device).reshape([1, 1]),
        }
    }

    fn output_from(logits: [f32; 3], btts: f32, over: f32) -> MultiTaskOutput<TestBackend> {
        let device = Default::default();
        MultiTaskOutput {
            outcome_logits: Tensor::<TestBackend, 1>::from_floats(logits.as_slice(), &device).reshape([1, 3]),
            btts_logit: Tensor::<TestBackend, 1>::from_floats([btts].as_slice(), &device).reshape([1, 1]),
            over_logit: Tensor::<TestBackend, 1>::from_floats([over].as_slice(), &device).reshape([1, 1]),
        }
    }

    #[test]
    fn test_uniform_prediction_loss() {
        let loss_fn = MultiTaskLoss::new(LossConfig::default());
        let loss = loss_fn
            .forward(&output_from([0.0, 0.0, 0.0], 0.0, 0.0), &batch_from([1.0, 0.0, 0.0], 1.0, 0.0))
            .to_scalars();

        assert!((loss.outcome - 3.0f32.ln()).abs() < 1e-4);
        assert!((loss.btts - 2.0f32.ln()).abs() < 1e-4);
        assert!((loss.over_under - 2.0f32.ln()).abs() < 1e-4);
        assert!((loss.total - (3.0f32.ln() + 2.0 * 2.0f32.ln())).abs() < 1e-4);
    }

    #[test]
    fn test_loss_weights() {
        let loss_fn = MultiTaskLoss::new(LossConfig {
            outcome_weight: 2.0,
            btts_weight: 0.0,
            over_under_weight: 0.0,
        });
        let loss = loss_fn
            .forward(&output_from([0.0, 0.0, 0.0], 3.0, -3.0), &batch_from([0.0, 1.0, 0.0], 0.0, 1.0))
            .to_scalars();
        assert!((loss.total - 2.0 * 3.0f32.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_batch_hits() {
        let hits = batch_hits(&output_from([0.1, 2.0, -1.0], 1.5, -0.5), &batch_from([0.0, 1.0, 0.0], 1.0, 1.0));
        assert_eq!(hits, BatchHits { outcome: 1, btts: 1, over_under: 0 });
    }

    #[test]
    fn test_training_reduces_loss() {
        let data = SyntheticLeague::new(10, 11).generate(200);
        let (dataset, _) = FootyDataset::build(&data.fixtures, &data.statistics, &FeatureExtractor::default());
        let splits = dataset.split(0.2, 0.2, 42);
        let normalizer = FeatureNormalizer::fit(&splits.train).unwrap();

        let device = Default::default();
        let model = MultiTaskModel::<TestAutodiffBackend>::new(&device, &ModelConfig::default());
        let loss_fn = MultiTaskLoss::new(LossConfig::default());
        let before = evaluate(&model.valid(), &normalizer, &loss_fn, &splits.train, &device).avg_loss();

        let config = TrainingConfig {
            epochs: 15,
            early_stopping_patience: 15,
            ..TrainingConfig::default()
        };
        let trainer = MultiTaskTrainer::new(model, normalizer.clone(), LossConfig::default(), config, device);
        let (trained, history) = trainer.train(splits.train.clone(), splits.val).unwrap();

        let after = evaluate(&trained, &normalizer, &loss_fn, &splits.train, &Default::default()).avg_loss();
        assert!(after < before, "loss {} -> {}", before, after);
        assert!(history.epochs_run() >= 1);
        assert!(history.best_val_loss.is_finite());
    }

    #[test]
    fn test_cancelled_before_start() {
        let data = SyntheticLeague::new(6, 2).generate(30);
        let (dataset, _) = FootyDataset::build(&data.fixtures, &data.statistics, &FeatureExtractor::default());
        let normalizer = FeatureNormalizer::fit(&dataset).unwrap();
        let device = Default::default();
        let model = MultiTaskModel::<TestAutodiffBackend>::new(&device, &ModelConfig::default());

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = MultiTaskTrainer::new(model, normalizer, LossConfig::default(), TrainingConfig::default(), device)
            .with_cancel(cancel)
            .train(dataset.clone(), dataset);

        assert!(matches!(result, Err(FootyError::Cancelled)));
    }
}
