//! Train and analyze operations as structured responses
//!
//! These compose the store, the training pipeline, the registry and the
//! value-bet detector. Failures become `success: false` payloads.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::data::database::{Database, PredictionRecord};
use crate::features::Corpus;
use crate::model::artifact::TrainedModel;
use crate::predict::engine::{PredictionEngine, PredictionSet};
use crate::predict::registry::ModelRegistry;
use crate::predict::value::{MarketOdds, ValueBet, ValueBetDetector};
use crate::training::pipeline::{TrainingPipeline, TrainingReport};
use crate::{FixtureId, FixtureStatus, FootyError, Result};

/// Outcome of a training request
#[derive(Debug, Clone, Serialize)]
pub struct TrainResponse {
    pub success: bool,
    pub message: String,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

/// Predictions and value bets for one fixture
#[derive(Debug, Clone, Serialize)]
pub struct FixtureAnalysis {
    pub fixture_id: FixtureId,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: NaiveDateTime,
    pub predictions: BTreeMap<&'static str, BTreeMap<&'static str, f64>>,
    pub value_bets: Vec<ValueBet>,
    /// True when some features were defaults or placeholders
    pub imputed: bool,
}

/// Outcome of an analysis request
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<FixtureAnalysis>,
}

impl AnalyzeResponse {
    fn failure(message: impl Into<String>) -> Self {
        AnalyzeResponse {
            success: false,
            message: message.into(),
            results: Vec::new(),
        }
    }
}

/// Train on every finished fixture in the store and publish the result
///
/// The artifact is saved before the registry is updated; a failed run
/// leaves both untouched.
pub fn train_from_store(db: &Database, registry: &ModelRegistry, pipeline: &TrainingPipeline) -> TrainResponse {
    match train_and_publish(db, registry, pipeline) {
        Ok(report) => TrainResponse {
            success: true,
            message: format!("Model trained successfully on {} fixtures", report.sample_count),
            sample_count: report.sample_count,
            report: Some(report),
        },
        Err(e) => {
            log::warn!("Training failed: {}", e);
            let sample_count = match &e {
                FootyError::InsufficientData { found, .. } => *found,
                _ => 0,
            };
            TrainResponse {
                success: false,
                message: e.to_string(),
                sample_count,
                report: None,
            }
        }
    }
}

fn train_and_publish(db: &Database, registry: &ModelRegistry, pipeline: &TrainingPipeline) -> Result<TrainingReport> {
    let fixtures = db.get_fixtures_by_status(FixtureStatus::Finished)?;
    let statistics = db.get_all_statistics()?;
    log::info!(
        "Training on {} finished fixtures ({} statistics records)",
        fixtures.len(),
        statistics.len()
    );

    let (trained, report) = pipeline.train(&fixtures, &statistics)?;
    registry.store().save(&trained)?;
    registry.publish(trained);
    Ok(report)
}

/// Predict the given fixtures and flag value bets against `odds`
///
/// Unknown fixtures, fixtures without statistics and fixtures whose
/// predictions cannot be stored are skipped. Every selection of each
/// analysed fixture is appended to the predictions table.
pub fn analyze_fixtures(
    db: &mut Database,
    registry: &ModelRegistry,
    detector: &ValueBetDetector,
    odds: &MarketOdds,
    fixture_ids: &[FixtureId],
) -> AnalyzeResponse {
    if fixture_ids.is_empty() {
        return AnalyzeResponse::failure("No fixtures selected for analysis");
    }

    let trained = match registry.get_or_load() {
        Ok(trained) => trained,
        Err(e) => return AnalyzeResponse::failure(e.to_string()),
    };

    match analyze_with(db, &trained, detector, odds, fixture_ids) {
        Ok(results) => AnalyzeResponse {
            success: true,
            message: format!("Analysis completed for {} fixtures", results.len()),
            results,
        },
        Err(e) => {
            log::warn!("Analysis failed: {}", e);
            AnalyzeResponse::failure(e.to_string())
        }
    }
}

fn analyze_with(
    db: &mut Database,
    trained: &TrainedModel,
    detector: &ValueBetDetector,
    odds: &MarketOdds,
    fixture_ids: &[FixtureId],
) -> Result<Vec<FixtureAnalysis>> {
    let fixtures = db.get_all_fixtures()?;
    let statistics = db.get_all_statistics()?;
    let corpus = Corpus::new(&fixtures, &statistics);
    let engine = PredictionEngine::new();

    let mut results = Vec::with_capacity(fixture_ids.len());
    for &id in fixture_ids {
        let Some(fixture) = fixtures.iter().find(|f| f.id == id) else {
            log::warn!("{} not found, skipping", id);
            continue;
        };

        let prediction = match engine.predict(fixture, &corpus, Some(trained)) {
            Ok(Some(prediction)) => prediction,
            Ok(None) => {
                log::warn!("{} has no statistics, skipping", id);
                continue;
            }
            Err(e) => {
                log::warn!("{}: prediction failed: {}", id, e);
                continue;
            }
        };

        let (home_team, away_team) = match (db.team_name(fixture.home_team), db.team_name(fixture.away_team)) {
            (Ok(home), Ok(away)) => (home, away),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("{}: {}, skipping", id, e);
                continue;
            }
        };

        let value_bets = detector.detect(&prediction, odds);
        if let Err(e) = db.insert_predictions(&prediction_records(&prediction, &value_bets, odds)) {
            log::warn!("{}: failed to store predictions: {}", id, e);
            continue;
        }

        results.push(FixtureAnalysis {
            fixture_id: id,
            home_team,
            away_team,
            kickoff: fixture.kickoff,
            predictions: prediction.by_market(),
            value_bets,
            imputed: prediction.imputed,
        });
    }

    Ok(results)
}

/// One row per selection, flagged when it was detected as a value bet
fn prediction_records(prediction: &PredictionSet, value_bets: &[ValueBet], odds: &MarketOdds) -> Vec<PredictionRecord> {
    prediction
        .iter()
        .map(|(selection, probability)| {
            let is_value = value_bets.iter().any(|bet| bet.selection == selection);
            PredictionRecord::now(prediction.fixture_id, selection, probability, is_value, odds.get(selection))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticLeague;
    use crate::model::artifact::ArtifactStore;
    use crate::model::mlp::MultiTaskModel;
    use crate::training::normalizer::FeatureNormalizer;
    use crate::{Config, FeatureConfig, FixtureStatistics, ModelConfig, Selection};
    use chrono::Utc;

    fn seeded_db(finished: usize, upcoming: usize) -> Database {
        let data = SyntheticLeague::new(8, 11).with_upcoming(upcoming).generate(finished);
        let db = Database::in_memory().unwrap();
        for team in &data.teams {
            db.upsert_team(team).unwrap();
        }
        db.upsert_fixtures(&data.fixtures).unwrap();
        for stats in &data.statistics {
            db.upsert_statistics(stats).unwrap();
        }
        db
    }

    fn registry_with_model(dir: &tempfile::TempDir) -> ModelRegistry {
        let config = ModelConfig {
            hidden_dims: vec![8],
            dropout: 0.0,
        };
        let registry = ModelRegistry::new(ArtifactStore::new(dir.path().join("model.json")));
        registry.publish(TrainedModel {
            model: MultiTaskModel::new(&Default::default(), &config),
            normalizer: FeatureNormalizer::identity(),
            model_config: config,
            feature_config: FeatureConfig::default(),
            sample_count: 0,
            created_at: Utc::now().naive_utc(),
        });
        registry
    }

    #[test]
    fn test_train_insufficient_data_leaves_registry_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(40, 0);
        let registry = ModelRegistry::new(ArtifactStore::new(dir.path().join("model.json")));

        let response = train_from_store(&db, &registry, &TrainingPipeline::new(Config::default()));
        assert!(!response.success);
        assert_eq!(response.sample_count, 40);
        assert!(response.message.contains("Insufficient"));
        assert!(registry.current().is_none());
        assert!(!registry.store().exists());
    }

    #[test]
    fn test_analyze_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_db(10, 2);
        let registry = ModelRegistry::new(ArtifactStore::new(dir.path().join("model.json")));

        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::placeholder(),
            &[FixtureId(1)],
        );
        assert!(!response.success);
        assert_eq!(response.message, "Model not trained - run `footy train` first");
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_analyze_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_db(10, 0);
        let registry = registry_with_model(&dir);
        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::placeholder(),
            &[],
        );
        assert!(!response.success);
    }

    #[test]
    fn test_analyze_skips_unknown_and_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_db(20, 2);
        let registry = registry_with_model(&dir);
        let fixtures = db.get_all_fixtures().unwrap();
        let known = fixtures[5].id;

        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::placeholder(),
            &[known, FixtureId(999_999)],
        );

        assert!(response.success);
        assert_eq!(response.message, "Analysis completed for 1 fixtures");
        assert_eq!(response.results.len(), 1);

        let result = &response.results[0];
        assert_eq!(result.fixture_id, known);
        assert!(!result.home_team.is_empty());
        assert_eq!(result.predictions.len(), 3);

        let rows = db.get_predictions_for_fixture(known).unwrap();
        assert_eq!(rows.len(), Selection::ALL.len());
        let flagged = rows.iter().filter(|r| r.is_value_bet).count();
        assert_eq!(flagged, result.value_bets.len());
        assert!(rows.iter().all(|r| r.odds.is_some()));
    }

    #[test]
    fn test_analyze_skips_fixture_without_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_db(20, 0);
        let registry = registry_with_model(&dir);

        let existing = db.get_all_fixtures().unwrap();
        let with_stats = existing[1].id;
        let mut fixture = existing[0].clone();
        fixture.id = FixtureId(424_242);
        fixture.status = FixtureStatus::NotStarted;
        fixture.score = None;
        db.upsert_fixture(&fixture).unwrap();

        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::placeholder(),
            &[fixture.id, with_stats],
        );

        assert!(response.success);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].fixture_id, with_stats);
        assert!(db.get_predictions_for_fixture(fixture.id).unwrap().is_empty());

        // An empty statistics record is enough to predict with defaults
        db.upsert_statistics(&FixtureStatistics::empty(fixture.id)).unwrap();
        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::new(),
            &[fixture.id],
        );
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].imputed);
        assert!(response.results[0].value_bets.is_empty());
    }

    #[test]
    fn test_analyze_continues_after_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_db(20, 0);
        let registry = registry_with_model(&dir);
        let fixtures = db.get_all_fixtures().unwrap();
        let (rejected, kept) = (fixtures[3].id, fixtures[6].id);

        db.execute_batch(&format!(
            "CREATE TRIGGER reject_predictions BEFORE INSERT ON predictions
             WHEN NEW.fixture_id = {}
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            rejected.0
        ))
        .unwrap();

        let response = analyze_fixtures(
            &mut db,
            &registry,
            &ValueBetDetector::default(),
            &MarketOdds::placeholder(),
            &[rejected, kept],
        );

        assert!(response.success);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].fixture_id, kept);
        assert!(db.get_predictions_for_fixture(rejected).unwrap().is_empty());
        assert_eq!(db.get_predictions_for_fixture(kept).unwrap().len(), Selection::ALL.len());
    }
}
