//! Churn model: feature encoding, classifiers, artifacts, and serving.
//!
//! - `features`: fixed-order feature vectors, one-hot policy indicators,
//!   forward fill, and min-max / standard normalization
//! - `classifier`: bagged random forest and single decision tree
//! - `artifact`: versioned model artifact with its normalizer
//! - `service`: lock-guarded prediction service

pub mod artifact;
pub mod classifier;
pub mod features;
pub mod models;
pub mod service;

pub use artifact::{artifact_digest, ChurnModel, ARTIFACT_FORMAT_VERSION};
pub use classifier::{Classifier, ClassifierModel, RandomForest, SingleTree};
pub use features::{
    forward_fill, ColumnStats, FeatureEncoder, FeatureVector, Normalizer, ScalingMethod,
    FEATURE_COUNT, FEATURE_NAMES,
};
pub use models::{ModelMetadata, ModelMetrics, ModelType, PredictionOutcome, TrainingDataset};
pub use service::{LoadedModel, PredictionService, ServiceState};
