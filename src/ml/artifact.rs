use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ClassifierModel};
use crate::ml::features::{FeatureVector, Normalizer, FEATURE_COUNT, FEATURE_NAMES};
use crate::ml::models::{ModelMetadata, PredictionOutcome};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever the encoded layout of `ChurnModel` changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Trained classifier plus everything needed to feed it consistently
#[derive(Serialize, Deserialize)]
pub struct ChurnModel {
    pub metadata: ModelMetadata,

    /// Column order at fit time
    pub feature_names: Vec<String>,

    /// Statistics the training rows were normalized with
    pub normalizer: Normalizer,

    pub classifier: ClassifierModel,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    model: &'a ChurnModel,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    model: ChurnModel,
}

impl ChurnModel {
    pub fn new(metadata: ModelMetadata, normalizer: Normalizer, classifier: ClassifierModel) -> Self {
        Self {
            metadata,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            normalizer,
            classifier,
        }
    }

    /// Encode as a versioned bincode artifact
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let envelope = EnvelopeRef {
            format_version: ARTIFACT_FORMAT_VERSION,
            model: self,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode an artifact; any failure means the model is unavailable
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // The version is the first field, so it can be checked without
        // decoding a model of an unknown layout.
        let version: u32 = bincode::deserialize(bytes).map_err(|e| {
            AppError::ModelUnavailable(format!("Failed to read artifact header: {}", e))
        })?;
        if version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::ModelUnavailable(format!(
                "Unsupported artifact format version {} (expected {})",
                version, ARTIFACT_FORMAT_VERSION
            )));
        }

        let envelope: Envelope = bincode::deserialize(bytes).map_err(|e| {
            AppError::ModelUnavailable(format!("Failed to decode model artifact: {}", e))
        })?;
        let model = envelope.model;

        if model.feature_names != FEATURE_NAMES {
            return Err(AppError::ModelUnavailable(format!(
                "Artifact feature order {:?} does not match {:?}",
                model.feature_names, FEATURE_NAMES
            )));
        }
        if !model.classifier.is_trained() {
            return Err(AppError::ModelUnavailable(
                "Artifact holds an untrained classifier".to_string(),
            ));
        }

        Ok(model)
    }

    /// Run the classifier on one already-scaled vector
    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionOutcome> {
        let x = Array2::from_shape_vec((1, FEATURE_COUNT), vector.to_vec())
            .map_err(|e| AppError::Prediction(format!("Failed to create feature array: {}", e)))?;

        let labels = self.classifier.predict(&x)?;
        let label = *labels
            .first()
            .ok_or_else(|| AppError::Prediction("Classifier returned no label".to_string()))?;

        let probabilities = self
            .classifier
            .predict_proba(&x)?
            .map(|proba| proba.rows().into_iter().map(|row| row.to_vec()).collect());

        Ok(PredictionOutcome {
            label: label as i64,
            probabilities,
        })
    }
}

/// Hex SHA-256 of an encoded artifact
pub fn artifact_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
