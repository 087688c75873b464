//! End-to-end training: dataset assembly, split, normalization, fit, evaluation

use burn::tensor::backend::Backend;
use chrono::Utc;
use serde::Serialize;

use crate::data::dataset::FootyDataset;
use crate::features::FeatureExtractor;
use crate::model::artifact::TrainedModel;
use crate::model::mlp::MultiTaskModel;
use crate::training::job::{CancelToken, ProgressReporter};
use crate::training::metrics::Metrics;
use crate::training::normalizer::FeatureNormalizer;
use crate::training::trainer::{evaluate, MultiTaskLoss, MultiTaskTrainer};
use crate::{Config, Fixture, FixtureStatistics, FootyError, Result, TrainingBackend};

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    /// Valid (features, label) samples
    pub sample_count: usize,
    /// Finished fixtures skipped during assembly
    pub skipped: usize,
    pub train_size: usize,
    pub val_size: usize,
    pub test_size: usize,
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    /// Holdout metrics of the restored best model
    pub test: Metrics,
}

/// Turns a fixture corpus into a trained model
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: Config,
}

impl TrainingPipeline {
    pub fn new(config: Config) -> Self {
        TrainingPipeline { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Train on every usable finished fixture
    ///
    /// Fails with `InsufficientData` when fewer than `training.min_samples`
    /// (and never fewer than 3) samples can be built. Nothing is persisted.
    pub fn train(
        &self,
        fixtures: &[Fixture],
        statistics: &[FixtureStatistics],
    ) -> Result<(TrainedModel, TrainingReport)> {
        self.train_with(fixtures, statistics, CancelToken::new(), None)
    }

    /// Train with cooperative cancellation and optional progress reporting
    pub fn train_with(
        &self,
        fixtures: &[Fixture],
        statistics: &[FixtureStatistics],
        cancel: CancelToken,
        progress: Option<ProgressReporter>,
    ) -> Result<(TrainedModel, TrainingReport)> {
        let training = &self.config.training;
        let extractor = FeatureExtractor::new(self.config.features.clone());

        let (dataset, assembly) = FootyDataset::build(fixtures, statistics, &extractor);
        let sample_count = dataset.len();
        // Train, validation and test each need at least one sample
        let required = training.min_samples.max(3);
        if sample_count < required {
            log::warn!("Not enough training data: {} samples, need {}", sample_count, required);
            return Err(FootyError::InsufficientData {
                found: sample_count,
                required,
            });
        }

        let splits = dataset.split(training.test_ratio, training.validation_ratio, training.seed);
        let normalizer = FeatureNormalizer::fit(&splits.train)?;
        log::debug!(
            "Feature normalization: mean={:?}, std={:?}",
            normalizer.mean,
            normalizer.std
        );

        TrainingBackend::seed(training.seed);
        let device = <TrainingBackend as Backend>::Device::default();
        let model = MultiTaskModel::<TrainingBackend>::new(&device, &self.config.model);

        let mut trainer = MultiTaskTrainer::new(
            model,
            normalizer.clone(),
            self.config.loss.clone(),
            training.clone(),
            device.clone(),
        )
        .with_cancel(cancel);
        if let Some(progress) = progress {
            trainer = trainer.with_progress(progress);
        }

        let train_size = splits.train.len();
        let val_size = splits.val.len();
        let (model, history) = trainer.train(splits.train, splits.val)?;

        let loss_fn = MultiTaskLoss::new(self.config.loss.clone());
        let test = evaluate(&model, &normalizer, &loss_fn, &splits.test, &device);
        log::info!("Test: {}", test);

        let report = TrainingReport {
            sample_count,
            skipped: assembly.skipped,
            train_size,
            val_size,
            test_size: splits.test.len(),
            epochs_run: history.epochs_run(),
            best_epoch: history.best_epoch + 1,
            best_val_loss: history.best_val_loss,
            test,
        };

        let trained = TrainedModel {
            model,
            normalizer,
            model_config: self.config.model.clone(),
            feature_config: self.config.features.clone(),
            sample_count,
            created_at: Utc::now().naive_utc(),
        };

        Ok((trained, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticLeague;

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.training.epochs = 3;
        config
    }

    #[test]
    fn test_insufficient_data() {
        let data = SyntheticLeague::new(8, 5).generate(60);
        let pipeline = TrainingPipeline::new(quick_config());

        let result = pipeline.train(&data.fixtures, &data.statistics);
        match result {
            Err(FootyError::InsufficientData { found, required }) => {
                assert_eq!(found, 60);
                assert_eq!(required, 100);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|(_, r)| r)),
        }
    }

    #[test]
    fn test_insufficient_data_reports_split_floor() {
        let data = SyntheticLeague::new(4, 2).generate(2);
        let mut config = quick_config();
        config.training.min_samples = 1;

        let result = TrainingPipeline::new(config).train(&data.fixtures, &data.statistics);
        match result {
            Err(FootyError::InsufficientData { found, required }) => {
                assert_eq!(found, 2);
                assert_eq!(required, 3);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|(_, r)| r)),
        }
    }

    #[test]
    fn test_report_counts() {
        let data = SyntheticLeague::new(10, 9).generate(130);
        let pipeline = TrainingPipeline::new(quick_config());

        let (trained, report) = pipeline.train(&data.fixtures, &data.statistics).unwrap();

        assert_eq!(report.sample_count, 130);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.train_size + report.val_size + report.test_size, 130);
        assert_eq!(report.test_size, 26);
        assert!(report.epochs_run <= 3);
        assert_eq!(report.test.total_predictions, 26);
        assert_eq!(trained.sample_count, 130);
    }
}
