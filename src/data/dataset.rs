//! Burn Dataset implementation for fixture training samples

use crate::features::{Corpus, ExtractMode, FeatureExtractor, FeatureVector, Label};
use crate::{Fixture, FixtureId, FixtureStatistics, FootyError};
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A single (features, label) training sample
#[derive(Debug, Clone)]
pub struct FixtureSample {
    pub fixture_id: FixtureId,
    pub features: [f32; FeatureVector::DIM],
    pub label: [f32; Label::DIM],
}

/// Counts from dataset assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Finished fixtures considered
    pub candidates: usize,
    /// Fixtures skipped because features or labels could not be built
    pub skipped: usize,
}

/// Dataset of fixture samples
#[derive(Debug, Clone, Default)]
pub struct FootyDataset {
    samples: Vec<FixtureSample>,
}

impl FootyDataset {
    pub fn from_samples(samples: Vec<FixtureSample>) -> Self {
        FootyDataset { samples }
    }

    /// Build samples from every finished fixture in the corpus
    ///
    /// Fixtures whose features or labels cannot be computed are skipped and
    /// counted.
    pub fn build(
        fixtures: &[Fixture],
        statistics: &[FixtureStatistics],
        extractor: &FeatureExtractor,
    ) -> (Self, AssemblyStats) {
        let corpus = Corpus::new(fixtures, statistics);
        let mut stats = AssemblyStats::default();
        let mut samples = Vec::new();

        for fixture in fixtures.iter().filter(|f| f.is_finished()) {
            stats.candidates += 1;
            let sample = extractor
                .extract(fixture, &corpus, ExtractMode::Training)
                .and_then(|features| Label::from_fixture(fixture).map(|label| (features, label)));

            match sample {
                Ok((features, label)) => samples.push(FixtureSample {
                    fixture_id: fixture.id,
                    features: features.values,
                    label: label.to_vec(),
                }),
                Err(e @ (FootyError::MissingStatistics(_) | FootyError::MissingScore(_))) => {
                    log::debug!("Skipping fixture: {}", e);
                    stats.skipped += 1;
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", fixture.id, e);
                    stats.skipped += 1;
                }
            }
        }

        log::info!(
            "Built {} samples from {} finished fixtures ({} skipped)",
            samples.len(),
            stats.candidates,
            stats.skipped
        );

        (FootyDataset { samples }, stats)
    }

    pub fn samples(&self) -> &[FixtureSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Seeded shuffle into train / validation / test splits
    ///
    /// `test_ratio` of all samples is held out first, then `validation_ratio`
    /// of the remainder is used for validation. Each split gets at least one
    /// sample when there are at least three.
    pub fn split(self, test_ratio: f32, validation_ratio: f32, seed: u64) -> DatasetSplits {
        let mut samples = self.samples;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let n = samples.len();
        let n_test = split_size(n, test_ratio);
        let n_val = split_size(n - n_test, validation_ratio);

        let test: Vec<_> = samples.drain(..n_test).collect();
        let val: Vec<_> = samples.drain(..n_val).collect();
        let train = samples;

        log::info!(
            "Split {} samples: train={}, val={}, test={}",
            n,
            train.len(),
            val.len(),
            test.len()
        );

        DatasetSplits {
            train: FootyDataset::from_samples(train),
            val: FootyDataset::from_samples(val),
            test: FootyDataset::from_samples(test),
        }
    }
}

fn split_size(n: usize, ratio: f32) -> usize {
    if n < 3 {
        return 0;
    }
    ((n as f32 * ratio).round() as usize).clamp(1, n - 1)
}

impl Dataset<FixtureSample> for FootyDataset {
    fn get(&self, index: usize) -> Option<FixtureSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Train / validation / test datasets
pub struct DatasetSplits {
    pub train: FootyDataset,
    pub val: FootyDataset,
    pub test: FootyDataset,
}

/// Batched fixture samples
#[derive(Debug, Clone)]
pub struct FixtureBatch<B: Backend> {
    /// Raw (unnormalized) features [batch, 22]
    pub features: Tensor<B, 2>,
    /// One-hot outcome [batch, 3]
    pub outcome: Tensor<B, 2>,
    /// Both teams scored [batch, 1]
    pub btts: Tensor<B, 2>,
    /// Over 2.5 goals [batch, 1]
    pub over_2_5: Tensor<B, 2>,
}

impl<B: Backend> FixtureBatch<B> {
    pub fn len(&self) -> usize {
        self.features.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole dataset as a single batch
    pub fn from_dataset(dataset: &FootyDataset, device: &B::Device) -> Self {
        FixtureBatcher::<B>::new(device.clone()).batch(dataset.samples.clone(), device)
    }
}

/// Batcher for fixture samples
#[derive(Clone)]
pub struct FixtureBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> FixtureBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        FixtureBatcher { device }
    }
}

impl<B: Backend> Batcher<B, FixtureSample, FixtureBatch<B>> for FixtureBatcher<B> {
    fn batch(&self, items: Vec<FixtureSample>, _device: &B::Device) -> FixtureBatch<B> {
        let batch_size = items.len();

        let mut features = Vec::with_capacity(batch_size * FeatureVector::DIM);
        let mut outcome = Vec::with_capacity(batch_size * 3);
        let mut btts = Vec::with_capacity(batch_size);
        let mut over = Vec::with_capacity(batch_size);

        for sample in &items {
            features.extend_from_slice(&sample.features);
            outcome.extend_from_slice(&sample.label[..3]);
            btts.push(sample.label[3]);
            over.push(sample.label[4]);
        }

        FixtureBatch {
            features: Tensor::<B, 1>::from_floats(features.as_slice(), &self.device)
                .reshape([batch_size, FeatureVector::DIM]),
            outcome: Tensor::<B, 1>::from_floats(outcome.as_slice(), &self.device)
                .reshape([batch_size, 3]),
            btts: Tensor::<B, 1>::from_floats(btts.as_slice(), &self.device)
                .reshape([batch_size, 1]),
            over_2_5: Tensor::<B, 1>::from_floats(over.as_slice(), &self.device)
                .reshape([batch_size, 1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticLeague;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn sample(id: i64) -> FixtureSample {
        FixtureSample {
            fixture_id: FixtureId(id),
            features: [id as f32; FeatureVector::DIM],
            label: [1.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    #[test]
    fn test_build_skips_fixtures_without_statistics() {
        let league = SyntheticLeague::new(8, 7).with_upcoming(3).generate(40);
        // Drop statistics for the first five (finished) fixtures
        let stats: Vec<_> = league.statistics.iter().skip(5).cloned().collect();

        let (dataset, assembly) = FootyDataset::build(&league.fixtures, &stats, &FeatureExtractor::default());

        let finished = league.fixtures.iter().filter(|f| f.is_finished()).count();
        assert_eq!(assembly.candidates, finished);
        assert_eq!(dataset.len() + assembly.skipped, finished);
        assert_eq!(assembly.skipped, 5);
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let dataset = FootyDataset::from_samples((0..100).map(sample).collect());

        let a = dataset.clone().split(0.2, 0.2, 42);
        let b = dataset.split(0.2, 0.2, 42);

        assert_eq!(a.test.len(), 20);
        assert_eq!(a.val.len(), 16);
        assert_eq!(a.train.len(), 64);

        let ids = |d: &FootyDataset| d.samples().iter().map(|s| s.fixture_id).collect::<Vec<_>>();
        assert_eq!(ids(&a.train), ids(&b.train));
        assert_eq!(ids(&a.test), ids(&b.test));

        let mut all: Vec<_> = ids(&a.train);
        all.extend(ids(&a.val));
        all.extend(ids(&a.test));
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = FixtureBatcher::<TestBackend>::new(device);
        let batch = batcher.batch(vec![sample(1), sample(2), sample(3)], &Default::default());

        assert_eq!(batch.features.dims(), [3, FeatureVector::DIM]);
        assert_eq!(batch.outcome.dims(), [3, 3]);
        assert_eq!(batch.btts.dims(), [3, 1]);
        assert_eq!(batch.over_2_5.dims(), [3, 1]);
        assert_eq!(batch.len(), 3);
    }
}
