//! Seed, train, persist, reload and analyze against a synthetic league

use std::sync::{Mutex, MutexGuard};

use burn::tensor::Tensor;
use footy::data::{Database, SyntheticLeague};
use footy::features::{Corpus, FeatureVector};
use footy::model::ArtifactStore;
use footy::predict::{
    analyze_fixtures, train_from_store, MarketOdds, ModelRegistry, PredictionEngine, ValueBetDetector,
};
use footy::training::TrainingPipeline;
use footy::{Config, FixtureStatus, InferenceBackend, Selection};

/// The backend seed is process-wide, so trainings in this binary run one at a time
static TRAINING: Mutex<()> = Mutex::new(());

fn training_lock() -> MutexGuard<'static, ()> {
    TRAINING.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn quick_config() -> Config {
    let mut config = Config::default();
    config.training.epochs = 15;
    config.training.early_stopping_patience = 5;
    config.training.batch_size = 16;
    config
}

fn seeded_db(finished: usize, upcoming: usize) -> Database {
    let data = SyntheticLeague::new(12, 2024).with_upcoming(upcoming).generate(finished);
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

#[test]
fn test_train_save_load_and_analyze() {
    let _guard = training_lock();
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model").join("footy_model.json");
    let mut db = seeded_db(140, 4);
    let registry = ModelRegistry::new(ArtifactStore::new(&model_path));

    let response = train_from_store(&db, &registry, &TrainingPipeline::new(quick_config()));
    assert!(response.success, "{}", response.message);
    assert_eq!(response.sample_count, 140);
    assert!(model_path.exists());

    let report = response.report.unwrap();
    assert_eq!(report.train_size + report.val_size + report.test_size, 140);
    assert!(report.epochs_run >= 1);

    // The persisted model reproduces the published one
    let published = registry.current().unwrap();
    let store = ArtifactStore::new(&model_path);
    let reloaded = store.load(&store.handle()).unwrap();
    let input = Tensor::<InferenceBackend, 2>::ones([2, FeatureVector::DIM], &Default::default());
    let a: Vec<f32> = published.model.forward(input.clone()).outcome_probs().into_data().iter::<f32>().collect();
    let b: Vec<f32> = reloaded.model.forward(input).outcome_probs().into_data().iter::<f32>().collect();
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-6);
    }
    assert_eq!(published.normalizer, reloaded.normalizer);

    // Upcoming fixtures are predicted with well-formed probabilities
    let fixtures = db.get_all_fixtures().unwrap();
    let statistics = db.get_all_statistics().unwrap();
    let corpus = Corpus::new(&fixtures, &statistics);
    let upcoming: Vec<_> = fixtures.iter().filter(|f| f.status == FixtureStatus::NotStarted).collect();
    assert_eq!(upcoming.len(), 4);

    let engine = PredictionEngine::new();
    for fixture in &upcoming {
        let set = engine.predict(fixture, &corpus, Some(&reloaded)).unwrap().unwrap();
        assert!((set.home + set.draw + set.away - 1.0).abs() < 1e-5);
        for (_, p) in set.iter() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    // A fresh registry lazily picks up the saved artifact
    let fresh = ModelRegistry::new(ArtifactStore::new(&model_path));
    let ids: Vec<_> = upcoming.iter().map(|f| f.id).collect();
    let analysis = analyze_fixtures(
        &mut db,
        &fresh,
        &ValueBetDetector::new(0.10),
        &MarketOdds::placeholder(),
        &ids,
    );
    assert!(analysis.success);
    assert_eq!(analysis.results.len(), 4);

    for result in &analysis.results {
        for bet in &result.value_bets {
            assert!(bet.market_odds > bet.implied_odds * 1.1);
        }
        let rows = db.get_predictions_for_fixture(result.fixture_id).unwrap();
        assert_eq!(rows.len(), Selection::ALL.len());
        assert_eq!(rows.iter().filter(|r| r.is_value_bet).count(), result.value_bets.len());
    }
    assert_eq!(db.get_stats().unwrap().prediction_count, 4 * Selection::ALL.len());
}

#[test]
fn test_failed_training_keeps_previous_model() {
    let _guard = training_lock();
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("footy_model.json");
    let registry = ModelRegistry::new(ArtifactStore::new(&model_path));

    let db = seeded_db(130, 0);
    let response = train_from_store(&db, &registry, &TrainingPipeline::new(quick_config()));
    assert!(response.success, "{}", response.message);
    let before = registry.current().unwrap();
    let saved = std::fs::read(&model_path).unwrap();

    let small = seeded_db(30, 0);
    let response = train_from_store(&small, &registry, &TrainingPipeline::new(quick_config()));
    assert!(!response.success);
    assert_eq!(response.sample_count, 30);

    assert!(std::sync::Arc::ptr_eq(&before, &registry.current().unwrap()));
    assert_eq!(std::fs::read(&model_path).unwrap(), saved);
}

#[test]
fn test_training_is_reproducible() {
    let _guard = training_lock();
    let data = SyntheticLeague::new(10, 5).generate(120);
    let pipeline = TrainingPipeline::new(quick_config());

    let (first, first_report) = pipeline.train(&data.fixtures, &data.statistics).unwrap();
    let (second, second_report) = pipeline.train(&data.fixtures, &data.statistics).unwrap();

    assert_eq!(first_report.train_size, second_report.train_size);
    assert_eq!(first_report.epochs_run, second_report.epochs_run);
    assert_eq!(first.normalizer, second.normalizer);

    let input = Tensor::<InferenceBackend, 2>::random(
        [6, FeatureVector::DIM],
        burn::tensor::Distribution::Normal(0.0, 1.0),
        &Default::default(),
    );
    let a = first.model.forward(input.clone());
    let b = second.model.forward(input);
    let pairs = [
        (a.outcome_probs(), b.outcome_probs()),
        (a.btts_prob(), b.btts_prob()),
        (a.over_prob(), b.over_prob()),
    ];
    for (x, y) in pairs {
        let x: Vec<f32> = x.into_data().iter::<f32>().collect();
        let y: Vec<f32> = y.into_data().iter::<f32>().collect();
        assert_eq!(x.len(), y.len());
        for (p, q) in x.iter().zip(&y) {
            assert!((p - q).abs() < 1e-6, "{} vs {}", p, q);
        }
    }

    // A different seed starts from different weights
    let mut reseeded = quick_config();
    reseeded.training.seed += 1;
    let (third, _) = TrainingPipeline::new(reseeded)
        .train(&data.fixtures, &data.statistics)
        .unwrap();
    let c: Vec<f32> = third
        .model
        .forward(Tensor::ones([1, FeatureVector::DIM], &Default::default()))
        .outcome_probs()
        .into_data()
        .iter::<f32>()
        .collect();
    let d: Vec<f32> = first
        .model
        .forward(Tensor::ones([1, FeatureVector::DIM], &Default::default()))
        .outcome_probs()
        .into_data()
        .iter::<f32>()
        .collect();
    assert!(c.iter().zip(&d).any(|(p, q)| (p - q).abs() > 1e-6));
}
