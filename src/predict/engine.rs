//! Prediction engine
//!
//! Applies a trained model's normalizer and classifier to the engineered
//! features of one fixture.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::Serialize;

use crate::features::{Corpus, ExtractMode, FeatureExtractor, FeatureVector};
use crate::model::artifact::TrainedModel;
use crate::{Fixture, FixtureId, FootyError, InferenceBackend, Market, Result, Selection};

/// Calibrated probabilities for every selection of one fixture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSet {
    pub fixture_id: FixtureId,
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub btts_yes: f64,
    pub over_2_5: f64,
    /// True when any input feature was a default or placeholder
    pub imputed: bool,
    /// Number of imputed features
    pub imputed_count: usize,
}

impl PredictionSet {
    /// Probability assigned to a selection
    pub fn probability(&self, selection: Selection) -> f64 {
        match selection {
            Selection::Home => self.home,
            Selection::Draw => self.draw,
            Selection::Away => self.away,
            Selection::BttsYes => self.btts_yes,
            Selection::BttsNo => 1.0 - self.btts_yes,
            Selection::Over25 => self.over_2_5,
            Selection::Under25 => 1.0 - self.over_2_5,
        }
    }

    /// All selections with their probabilities, in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Selection, f64)> + '_ {
        Selection::ALL.iter().map(move |s| (*s, self.probability(*s)))
    }

    /// Nested `{market: {selection: probability}}` view
    pub fn by_market(&self) -> BTreeMap<&'static str, BTreeMap<&'static str, f64>> {
        let mut markets: BTreeMap<&'static str, BTreeMap<&'static str, f64>> = BTreeMap::new();
        for (selection, p) in self.iter() {
            markets
                .entry(selection.market().name())
                .or_default()
                .insert(selection.name(), p);
        }
        markets
    }

    /// Most likely selection within a market
    pub fn favourite(&self, market: Market) -> Selection {
        market
            .selections()
            .iter()
            .copied()
            .fold(None, |best: Option<(Selection, f64)>, s| {
                let p = self.probability(s);
                match best {
                    Some((_, bp)) if bp >= p => best,
                    _ => Some((s, p)),
                }
            })
            .map(|(s, _)| s)
            .unwrap_or(market.selections()[0])
    }
}

/// Produces prediction sets from a trained model
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine;

impl PredictionEngine {
    pub fn new() -> Self {
        PredictionEngine
    }

    /// Predict one fixture
    ///
    /// Returns `Ok(None)` when the fixture has no statistics record, and
    /// `ModelNotLoaded` when no model is supplied.
    pub fn predict(
        &self,
        fixture: &Fixture,
        corpus: &Corpus,
        model: Option<&TrainedModel>,
    ) -> Result<Option<PredictionSet>> {
        let trained = model.ok_or(FootyError::ModelNotLoaded)?;

        // Features are built exactly as they were for training
        let extractor = FeatureExtractor::new(trained.feature_config.clone());
        let features = match extractor.extract(fixture, corpus, ExtractMode::Prediction) {
            Ok(features) => features,
            Err(FootyError::MissingStatistics(id)) => {
                log::debug!("No statistics for {}, skipping prediction", id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(self.predict_features(fixture.id, &features, trained)))
    }

    /// Run the classifier on an already extracted feature vector
    pub fn predict_features(
        &self,
        fixture_id: FixtureId,
        features: &FeatureVector,
        trained: &TrainedModel,
    ) -> PredictionSet {
        let normalized = trained.normalizer.transform(&features.values);
        let device = <InferenceBackend as Backend>::Device::default();
        let input = Tensor::<InferenceBackend, 1>::from_floats(normalized.as_slice(), &device)
            .reshape([1, FeatureVector::DIM]);

        let output = trained.model.forward(input);
        let outcome: Vec<f32> = output.outcome_probs().into_data().iter::<f32>().collect();
        let btts = first(output.btts_prob());
        let over = first(output.over_prob());

        let prediction = PredictionSet {
            fixture_id,
            home: outcome.first().copied().unwrap_or_default() as f64,
            draw: outcome.get(1).copied().unwrap_or_default() as f64,
            away: outcome.get(2).copied().unwrap_or_default() as f64,
            btts_yes: btts,
            over_2_5: over,
            imputed: features.any_imputed(),
            imputed_count: features.imputed_count(),
        };

        log::debug!(
            "{}: 1X2 {:.3}/{:.3}/{:.3}, BTTS {:.3}, O2.5 {:.3}",
            fixture_id,
            prediction.home,
            prediction.draw,
            prediction.away,
            prediction.btts_yes,
            prediction.over_2_5
        );
        prediction
    }
}

fn first(tensor: Tensor<InferenceBackend, 2>) -> f64 {
    tensor.into_data().iter::<f32>().next().unwrap_or_default() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mlp::MultiTaskModel;
    use crate::training::normalizer::FeatureNormalizer;
    use crate::{FeatureConfig, FixtureStatistics, ModelConfig, TeamId};
    use chrono::{NaiveDate, Utc};

    fn untrained() -> TrainedModel {
        let config = ModelConfig::default();
        TrainedModel {
            model: MultiTaskModel::new(&Default::default(), &config),
            normalizer: FeatureNormalizer::identity(),
            model_config: config,
            feature_config: FeatureConfig::default(),
            sample_count: 0,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn upcoming() -> Fixture {
        Fixture::scheduled(
            FixtureId(77),
            TeamId(1),
            TeamId(2),
            NaiveDate::from_ymd_opt(2024, 9, 1)
                .unwrap()
                .and_hms_opt(16, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_requires_model() {
        let fixtures = vec![upcoming()];
        let corpus = Corpus::new(&fixtures, &[]);
        let result = PredictionEngine::new().predict(&fixtures[0], &corpus, None);
        assert!(matches!(result, Err(FootyError::ModelNotLoaded)));
    }

    #[test]
    fn test_missing_statistics_yields_none() {
        let fixtures = vec![upcoming()];
        let corpus = Corpus::new(&fixtures, &[]);
        let model = untrained();
        let result = PredictionEngine::new().predict(&fixtures[0], &corpus, Some(&model)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_probabilities_are_complementary() {
        let fixtures = vec![upcoming()];
        let stats = vec![FixtureStatistics::empty(FixtureId(77))];
        let corpus = Corpus::new(&fixtures, &stats);
        let model = untrained();

        let set = PredictionEngine::new()
            .predict(&fixtures[0], &corpus, Some(&model))
            .unwrap()
            .unwrap();

        assert!((set.home + set.draw + set.away - 1.0).abs() < 1e-5);
        assert!((set.probability(Selection::BttsYes) + set.probability(Selection::BttsNo) - 1.0).abs() < 1e-9);
        assert!((set.probability(Selection::Over25) + set.probability(Selection::Under25) - 1.0).abs() < 1e-9);
        for (_, p) in set.iter() {
            assert!((0.0..=1.0).contains(&p));
        }
        assert!(set.imputed);
        assert_eq!(set.imputed_count, FeatureVector::DIM);
        assert_eq!(set.by_market().len(), 3);
        assert_eq!(set.by_market()["1X2"].len(), 3);
    }

    #[test]
    fn test_favourite() {
        let set = PredictionSet {
            fixture_id: FixtureId(1),
            home: 0.2,
            draw: 0.3,
            away: 0.5,
            btts_yes: 0.7,
            over_2_5: 0.4,
            imputed: false,
            imputed_count: 0,
        };
        assert_eq!(set.favourite(Market::Outcome1X2), Selection::Away);
        assert_eq!(set.favourite(Market::Btts), Selection::BttsYes);
        assert_eq!(set.favourite(Market::OverUnder25), Selection::Under25);
    }
}
