//! Prediction and value-bet analysis
//!
//! Run trained models on fixtures, compare against market odds and persist
//! the results.

pub mod analysis;
pub mod engine;
pub mod registry;
pub mod value;

pub use analysis::{analyze_fixtures, train_from_store, AnalyzeResponse, FixtureAnalysis, TrainResponse};
pub use engine::{PredictionEngine, PredictionSet};
pub use registry::ModelRegistry;
pub use value::{implied_odds, MarketOdds, ValueBet, ValueBetDetector};
