//! Feature extraction and label encoding
//!
//! Converts historical fixtures and statistics into model-ready features.

pub mod corpus;
pub mod extractor;
pub mod form;
pub mod labels;

pub use corpus::Corpus;
pub use extractor::{ExtractMode, FeatureExtractor, FeatureVector, FEATURE_NAMES};
pub use form::TeamForm;
pub use labels::{Label, LabelEncoder, Outcome};
