//! Football value-bet prediction using deep learning
//!
//! Engineered fixture features feed a multi-task classifier predicting the
//! match outcome (1X2), both teams to score and over/under 2.5 goals. The
//! predicted probabilities are compared against market odds to flag value bets.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Backend used for inference and persisted models
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// Backend used for training (autodiff over the inference backend)
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixtureId(pub i64);

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixture({})", self.0)
    }
}

/// A team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// Lifecycle status of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureStatus {
    NotStarted,
    InProgress,
    Finished,
    Postponed,
    Cancelled,
}

impl FixtureStatus {
    pub fn code(&self) -> &'static str {
        match self {
            FixtureStatus::NotStarted => "NS",
            FixtureStatus::InProgress => "LIVE",
            FixtureStatus::Finished => "FT",
            FixtureStatus::Postponed => "PST",
            FixtureStatus::Cancelled => "CANC",
        }
    }

    /// Parse a status code or API-Football long/short status name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "NS" | "TBD" | "NOT STARTED" | "TIME TO BE DEFINED" => Some(FixtureStatus::NotStarted),
            "LIVE" | "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "INT" | "FIRST HALF"
            | "HALFTIME" | "SECOND HALF" | "EXTRA TIME" | "PENALTY IN PROGRESS"
            | "MATCH SUSPENDED" | "SUSP" | "IN PROGRESS" => Some(FixtureStatus::InProgress),
            "FT" | "AET" | "PEN" | "MATCH FINISHED" | "FINISHED"
            | "MATCH FINISHED AFTER EXTRA TIME" | "MATCH FINISHED AFTER PENALTY" => {
                Some(FixtureStatus::Finished)
            }
            "PST" | "MATCH POSTPONED" | "POSTPONED" => Some(FixtureStatus::Postponed),
            "CANC" | "ABD" | "AWD" | "WO" | "MATCH CANCELLED" | "MATCH ABANDONED"
            | "CANCELLED" => Some(FixtureStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::NotStarted => write!(f, "Not Started"),
            FixtureStatus::InProgress => write!(f, "In Progress"),
            FixtureStatus::Finished => write!(f, "Finished"),
            FixtureStatus::Postponed => write!(f, "Postponed"),
            FixtureStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Final score of a finished fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}

impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Score { home, away }
    }

    pub fn total(&self) -> u16 {
        self.home as u16 + self.away as u16
    }
}

/// A scheduled or completed match between two teams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    pub league_id: Option<i64>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub kickoff: NaiveDateTime,
    pub status: FixtureStatus,
    /// Populated only when the fixture is finished
    pub score: Option<Score>,
}

impl Fixture {
    /// A fixture that has not been played yet
    pub fn scheduled(id: FixtureId, home: TeamId, away: TeamId, kickoff: NaiveDateTime) -> Self {
        Fixture {
            id,
            league_id: None,
            home_team: home,
            away_team: away,
            kickoff,
            status: FixtureStatus::NotStarted,
            score: None,
        }
    }

    /// A finished fixture with its final score
    pub fn finished(
        id: FixtureId,
        home: TeamId,
        away: TeamId,
        kickoff: NaiveDateTime,
        score: Score,
    ) -> Self {
        Fixture {
            id,
            league_id: None,
            home_team: home,
            away_team: away,
            kickoff,
            status: FixtureStatus::Finished,
            score: Some(score),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == FixtureStatus::Finished
    }

    /// Goals are present iff the fixture is finished
    pub fn is_consistent(&self) -> bool {
        self.is_finished() == self.score.is_some()
    }

    pub fn involves(&self, team: TeamId) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// Goals scored by a team, if it played and the score is known
    pub fn goals_for(&self, team: TeamId) -> Option<u8> {
        let score = self.score?;
        if team == self.home_team {
            Some(score.home)
        } else if team == self.away_team {
            Some(score.away)
        } else {
            None
        }
    }

    /// Goals conceded by a team, if it played and the score is known
    pub fn goals_against(&self, team: TeamId) -> Option<u8> {
        let score = self.score?;
        if team == self.home_team {
            Some(score.away)
        } else if team == self.away_team {
            Some(score.home)
        } else {
            None
        }
    }
}

/// Per-side match statistics, each field independently optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideStatistics {
    pub possession: Option<f32>,
    pub shots: Option<u16>,
    pub shots_on_target: Option<u16>,
    pub corners: Option<u16>,
    pub fouls: Option<u16>,
    pub yellow_cards: Option<u16>,
    pub red_cards: Option<u16>,
}

/// Statistics recorded for one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureStatistics {
    pub fixture_id: FixtureId,
    pub home: SideStatistics,
    pub away: SideStatistics,
}

impl FixtureStatistics {
    pub fn empty(fixture_id: FixtureId) -> Self {
        FixtureStatistics {
            fixture_id,
            home: SideStatistics::default(),
            away: SideStatistics::default(),
        }
    }
}

/// Betting market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "1X2")]
    Outcome1X2,
    #[serde(rename = "BTTS")]
    Btts,
    #[serde(rename = "Over/Under 2.5")]
    OverUnder25,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Outcome1X2, Market::Btts, Market::OverUnder25];

    pub fn name(&self) -> &'static str {
        match self {
            Market::Outcome1X2 => "1X2",
            Market::Btts => "BTTS",
            Market::OverUnder25 => "Over/Under 2.5",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "1X2" => Some(Market::Outcome1X2),
            "BTTS" => Some(Market::Btts),
            "OVER/UNDER 2.5" | "O/U 2.5" | "OU25" => Some(Market::OverUnder25),
            _ => None,
        }
    }

    pub fn selections(&self) -> &'static [Selection] {
        match self {
            Market::Outcome1X2 => &[Selection::Home, Selection::Draw, Selection::Away],
            Market::Btts => &[Selection::BttsYes, Selection::BttsNo],
            Market::OverUnder25 => &[Selection::Over25, Selection::Under25],
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A specific outcome within a market. Every selection belongs to exactly one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Selection {
    Home,
    Draw,
    Away,
    BttsYes,
    BttsNo,
    Over25,
    Under25,
}

impl Selection {
    pub const ALL: [Selection; 7] = [
        Selection::Home,
        Selection::Draw,
        Selection::Away,
        Selection::BttsYes,
        Selection::BttsNo,
        Selection::Over25,
        Selection::Under25,
    ];

    pub fn market(&self) -> Market {
        match self {
            Selection::Home | Selection::Draw | Selection::Away => Market::Outcome1X2,
            Selection::BttsYes | Selection::BttsNo => Market::Btts,
            Selection::Over25 | Selection::Under25 => Market::OverUnder25,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Selection::Home => "Home",
            Selection::Draw => "Draw",
            Selection::Away => "Away",
            Selection::BttsYes => "Yes",
            Selection::BttsNo => "No",
            Selection::Over25 => "Over",
            Selection::Under25 => "Under",
        }
    }

    /// Resolve a selection name within a market
    pub fn from_names(market: Market, selection: &str) -> Option<Self> {
        let wanted = selection.trim().to_lowercase();
        market
            .selections()
            .iter()
            .copied()
            .find(|s| s.name().to_lowercase() == wanted)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum FootyError {
    #[error("Insufficient training data: {found} valid samples, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    #[error("No statistics recorded for {0}")]
    MissingStatistics(FixtureId),

    #[error("{0} is not finished")]
    FixtureNotFinished(FixtureId),

    #[error("{0} has no final score")]
    MissingScore(FixtureId),

    #[error("Model not trained - run `footy train` first")]
    ModelNotLoaded,

    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Incompatible model artifact: {0}")]
    IncompatibleArtifact(String),

    #[error("Training cancelled")]
    Cancelled,

    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("Fixture not found: {0}")]
    FixtureNotFound(FixtureId),

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FootyError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub loss: LossConfig,
    pub features: FeatureConfig,
    pub value: ValueConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub early_stopping_patience: usize,
    /// Minimum number of valid (feature, label) samples required to train
    pub min_samples: usize,
    /// Fraction of samples held out for the final evaluation
    pub test_ratio: f32,
    /// Fraction of the remaining samples used for early stopping
    pub validation_ratio: f32,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            batch_size: 32,
            learning_rate: 1e-3,
            weight_decay: 0.0,
            early_stopping_patience: 10,
            min_samples: 100,
            test_ratio: 0.2,
            validation_ratio: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            hidden_dims: vec![64, 32, 16],
            dropout: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub outcome_weight: f32,
    pub btts_weight: f32,
    pub over_under_weight: f32,
}

impl Default for LossConfig {
    fn default() -> Self {
        LossConfig {
            outcome_weight: 1.0,
            btts_weight: 1.0,
            over_under_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Number of prior finished fixtures used for form and goal averages
    pub form_window: usize,
    /// League position is not computed; this value is used for both sides
    pub league_position_placeholder: f32,
    pub default_possession: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            form_window: 5,
            league_position_placeholder: 10.0,
            default_possession: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    /// Market odds must exceed implied odds by this fraction to flag a value bet
    pub margin: f64,
    /// Optional JSON file with market odds; the placeholder table is used otherwise
    pub odds_path: Option<String>,
}

impl Default for ValueConfig {
    fn default() -> Self {
        ValueConfig {
            margin: 0.10,
            odds_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub database_path: String,
    pub model_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/footy.db".to_string(),
            model_path: "model/footy_model.json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FootyError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| FootyError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FootyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
