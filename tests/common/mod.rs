//! Shared fixtures for the integration tests

#![allow(dead_code)]

use churn_predictor::{
    config::InputScaling,
    ml::{
        ChurnModel, Classifier, ClassifierModel, FeatureVector, ModelMetadata, ModelType,
        Normalizer, PredictionService, ScalingMethod, TrainingDataset,
    },
    storage::{ArtifactStore, InMemoryArtifactStore},
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::sync::Arc;

pub const MODEL_KEY: &str = "model.bin";

/// Raw CSV with a forward-fill gap and an unknown policy type
pub const SAMPLE_CSV: &str = "\
customer_id,policy_type,age,annual_premium,claims_count,churn
c001,auto,23,650,3,1
c002,home,54,1200,0,0
c003,life,61,,1,0
c004,auto,31,720,4,1
c005,boat,45,980,2,0
c006,home,38,1100,0,0
c007,auto,27,610,5,1
c008,life,66,1500,0,0
c009,home,,1050,1,0
c010,auto,22,590,4,1
";

/// Forest trained on constant features with every label 0
pub fn always_zero_model(version: &str) -> ChurnModel {
    let dataset =
        TrainingDataset::new(Array2::from_elem((10, 6), 0.5), Array1::zeros(10)).unwrap();
    let mut classifier = ClassifierModel::new(ModelType::RandomForest, 5, None, 42);
    classifier.fit(&dataset).unwrap();

    let normalizer = Normalizer::fit(
        ScalingMethod::Standard,
        &[
            FeatureVector::new([25.0, 600.0, 0.0, 1.0, 0.0, 0.0]),
            FeatureVector::new([65.0, 1500.0, 4.0, 0.0, 1.0, 0.0]),
        ],
    )
    .unwrap();

    let metadata = ModelMetadata {
        name: "churn".to_string(),
        version: version.to_string(),
        model_type: ModelType::RandomForest,
        trained_at: chrono::Utc::now(),
        n_training_samples: 10,
        n_features: 6,
        validation_metrics: None,
        hyperparameters: HashMap::new(),
    };

    ChurnModel::new(metadata, normalizer, classifier)
}

/// Single tree that predicts churn exactly when the scaled age is negative.
///
/// The normalizer is fitted on ages 25 and 65, so a raw age of 25 scales to
/// -1.0 and 65 scales to 1.0.
pub fn age_sensitive_model() -> ChurnModel {
    let scaled_ages = [-1.5, -1.25, -1.0, -0.75, -0.5, -0.25, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5];
    let mut flat = Vec::new();
    let mut labels = Vec::new();
    for &age in &scaled_ages {
        flat.extend_from_slice(&[age, 0.0, 0.0, 1.0, 0.0, 0.0]);
        labels.push(usize::from(age < 0.0));
    }
    let dataset = TrainingDataset::new(
        Array2::from_shape_vec((scaled_ages.len(), 6), flat).unwrap(),
        Array1::from_vec(labels),
    )
    .unwrap();
    let mut classifier = ClassifierModel::new(ModelType::DecisionTree, 1, None, 42);
    classifier.fit(&dataset).unwrap();

    let normalizer = Normalizer::fit(
        ScalingMethod::Standard,
        &[
            FeatureVector::new([25.0, 600.0, 0.0, 1.0, 0.0, 0.0]),
            FeatureVector::new([65.0, 1500.0, 4.0, 0.0, 1.0, 0.0]),
        ],
    )
    .unwrap();

    let metadata = ModelMetadata {
        name: "churn".to_string(),
        version: "age".to_string(),
        model_type: ModelType::DecisionTree,
        trained_at: chrono::Utc::now(),
        n_training_samples: scaled_ages.len(),
        n_features: 6,
        validation_metrics: None,
        hyperparameters: HashMap::new(),
    };

    ChurnModel::new(metadata, normalizer, classifier)
}

pub async fn store_with(model: ChurnModel) -> InMemoryArtifactStore {
    let store = InMemoryArtifactStore::new();
    store
        .put(MODEL_KEY, model.to_bytes().unwrap())
        .await
        .unwrap();
    store
}

pub fn service_with_scaling(
    store: &InMemoryArtifactStore,
    scaling: InputScaling,
) -> Arc<PredictionService> {
    Arc::new(PredictionService::new(
        Arc::new(store.clone()),
        MODEL_KEY,
        scaling,
    ))
}

/// Request body for an auto policy holder with the given numeric fields
pub fn numeric_features_json(age: f64, annual_premium: f64, claims_count: f64) -> serde_json::Value {
    serde_json::json!({
        "features": {
            "age": age,
            "annual_premium": annual_premium,
            "claims_count": claims_count,
            "policy_auto": 1.0,
            "policy_home": 0.0,
            "policy_life": 0.0
        }
    })
}

pub async fn store_with_model(version: &str) -> InMemoryArtifactStore {
    let store = InMemoryArtifactStore::new();
    store
        .put(MODEL_KEY, always_zero_model(version).to_bytes().unwrap())
        .await
        .unwrap();
    store
}

pub fn service(store: &InMemoryArtifactStore) -> Arc<PredictionService> {
    Arc::new(PredictionService::new(
        Arc::new(store.clone()),
        MODEL_KEY,
        InputScaling::Raw,
    ))
}

pub fn features_json() -> serde_json::Value {
    serde_json::json!({
        "features": {
            "age": 42.0,
            "annual_premium": 980.0,
            "claims_count": 1.0,
            "policy_auto": 0.0,
            "policy_home": 1.0,
            "policy_life": 0.0
        }
    })
}

/// Parse Prometheus exposition text into sample lines per metric family
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            if let Some(name) = line.split_whitespace().nth(2) {
                current_metric = name.to_string();
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
