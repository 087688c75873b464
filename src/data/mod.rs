//! Data ingestion and storage
//!
//! API-Football payload parsing, synthetic data and SQLite database management.

pub mod api_football;
pub mod database;
pub mod dataset;
pub mod synthetic;

pub use database::{Database, DatabaseStats, PredictionRecord};
pub use dataset::{FixtureBatch, FixtureBatcher, FixtureSample, FootyDataset};
pub use synthetic::SyntheticLeague;
