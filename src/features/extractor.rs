//! Fixed-width feature vector extraction
//!
//! Every training sample and every live prediction goes through
//! [`FeatureExtractor::extract`], so the column order below is shared by
//! training and inference.

use super::corpus::Corpus;
use super::form::TeamForm;
use crate::{FeatureConfig, Fixture, FootyError, Result, SideStatistics};

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FeatureVector::DIM] = [
    "home_possession",
    "away_possession",
    "home_shots",
    "away_shots",
    "home_shots_on_target",
    "away_shots_on_target",
    "home_corners",
    "away_corners",
    "home_fouls",
    "away_fouls",
    "home_yellow_cards",
    "away_yellow_cards",
    "home_red_cards",
    "away_red_cards",
    "home_form",
    "away_form",
    "home_league_position",
    "away_league_position",
    "home_goals_scored_avg",
    "away_goals_scored_avg",
    "home_goals_conceded_avg",
    "away_goals_conceded_avg",
];

/// Whether the target fixture must already be finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Building training samples: the target must be finished
    Training,
    /// Live prediction: any status is accepted
    Prediction,
}

/// Engineered features for one fixture
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: [f32; FeatureVector::DIM],
    /// True where the value is a default or placeholder rather than observed data
    pub imputed: [bool; FeatureVector::DIM],
}

impl FeatureVector {
    pub const DIM: usize = 22;

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.to_vec()
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    pub fn is_imputed(&self, name: &str) -> bool {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.imputed[i])
            .unwrap_or(false)
    }

    pub fn imputed_count(&self) -> usize {
        self.imputed.iter().filter(|i| **i).count()
    }

    /// True if any value is not directly observed. League position is
    /// always a placeholder, so this only distinguishes degrees of imputation
    /// through [`FeatureVector::imputed_count`].
    pub fn any_imputed(&self) -> bool {
        self.imputed.iter().any(|i| *i)
    }
}

/// Writes (value, imputed) pairs in column order
struct VectorBuilder {
    values: [f32; FeatureVector::DIM],
    imputed: [bool; FeatureVector::DIM],
    next: usize,
}

impl VectorBuilder {
    fn new() -> Self {
        VectorBuilder {
            values: [0.0; FeatureVector::DIM],
            imputed: [false; FeatureVector::DIM],
            next: 0,
        }
    }

    fn push(&mut self, value: f32, imputed: bool) {
        self.values[self.next] = value;
        self.imputed[self.next] = imputed;
        self.next += 1;
    }

    fn push_count(&mut self, value: Option<u16>) {
        match value {
            Some(v) => self.push(v as f32, false),
            None => self.push(0.0, true),
        }
    }

    fn finish(self) -> FeatureVector {
        debug_assert_eq!(self.next, FeatureVector::DIM);
        FeatureVector {
            values: self.values,
            imputed: self.imputed,
        }
    }
}

/// Computes feature vectors from a fixture and the historical corpus
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        FeatureExtractor { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the feature vector for `target`
    ///
    /// Fails with `MissingStatistics` when the target has no statistics
    /// record and, in training mode, with `FixtureNotFinished` when the target
    /// has not been played.
    pub fn extract(&self, target: &Fixture, corpus: &Corpus, mode: ExtractMode) -> Result<FeatureVector> {
        if mode == ExtractMode::Training && !target.is_finished() {
            return Err(FootyError::FixtureNotFinished(target.id));
        }

        let stats = corpus
            .statistics(target.id)
            .ok_or(FootyError::MissingStatistics(target.id))?;

        let window = self.config.form_window;
        let home_form =
            TeamForm::from_fixtures(&corpus.recent_fixtures(target.home_team, target, window), target.home_team);
        let away_form =
            TeamForm::from_fixtures(&corpus.recent_fixtures(target.away_team, target, window), target.away_team);

        let mut builder = VectorBuilder::new();
        self.push_possession(&mut builder, &stats.home);
        self.push_possession(&mut builder, &stats.away);
        builder.push_count(stats.home.shots);
        builder.push_count(stats.away.shots);
        builder.push_count(stats.home.shots_on_target);
        builder.push_count(stats.away.shots_on_target);
        builder.push_count(stats.home.corners);
        builder.push_count(stats.away.corners);
        builder.push_count(stats.home.fouls);
        builder.push_count(stats.away.fouls);
        builder.push_count(stats.home.yellow_cards);
        builder.push_count(stats.away.yellow_cards);
        builder.push_count(stats.home.red_cards);
        builder.push_count(stats.away.red_cards);

        builder.push(home_form.points() as f32, home_form.is_empty());
        builder.push(away_form.points() as f32, away_form.is_empty());

        // League standings are not computed
        builder.push(self.config.league_position_placeholder, true);
        builder.push(self.config.league_position_placeholder, true);

        builder.push(home_form.avg_goals_for(), home_form.is_empty());
        builder.push(away_form.avg_goals_for(), away_form.is_empty());
        builder.push(home_form.avg_goals_against(), home_form.is_empty());
        builder.push(away_form.avg_goals_against(), away_form.is_empty());

        let features = builder.finish();
        log::trace!(
            "Extracted features for {} ({} imputed)",
            target.id,
            features.imputed_count()
        );
        Ok(features)
    }

    fn push_possession(&self, builder: &mut VectorBuilder, side: &SideStatistics) {
        match side.possession.filter(|p| p.is_finite()) {
            Some(p) => builder.push(p, false),
            None => builder.push(self.config.default_possession, true),
        }
    }
}
