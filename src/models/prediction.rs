use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(nested)]
    pub features: Option<FeaturesPayload>,
}

/// Named feature fields as submitted by a client.
///
/// All fields are optional at the wire level so that a missing field can be
/// reported by name instead of as a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FeaturesPayload {
    pub age: Option<f64>,
    pub annual_premium: Option<f64>,
    pub claims_count: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub policy_auto: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub policy_home: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub policy_life: Option<f64>,
}

impl FeaturesPayload {
    /// Fields paired with their names, in feature-vector order
    pub fn named_fields(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("age", self.age),
            ("annual_premium", self.annual_premium),
            ("claims_count", self.claims_count),
            ("policy_auto", self.policy_auto),
            ("policy_home", self.policy_home),
            ("policy_life", self.policy_life),
        ]
    }
}

/// Successful prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: i64,

    /// Per-class probabilities, one row per submitted vector
    pub probability: Option<Vec<Vec<f64>>>,
}

/// Result of `POST /load-model`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadModelResponse {
    pub status: String,
    pub location: String,
    pub bucket: Option<String>,
    pub key: String,
    pub model_version: String,
    pub artifact_sha256: String,
}
