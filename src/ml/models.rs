use crate::error::{AppError, Result};
use crate::ml::features::FEATURE_COUNT;
use crate::models::ProcessedRecord;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prediction for a single feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    /// Predicted class
    pub label: i64,

    /// Per-class probabilities, one row per submitted vector.
    /// `None` when the classifier has no probability capability.
    pub probabilities: Option<Vec<Vec<f64>>>,
}

/// Feature matrix and labels
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Class labels
    pub labels: Array1<usize>,
}

impl TrainingDataset {
    pub fn new(features: Array2<f64>, labels: Array1<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::Data(format!(
                "Feature rows ({}) and labels ({}) differ",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// Build from processed table rows
    pub fn from_records(records: &[ProcessedRecord]) -> Result<Self> {
        let mut flat = Vec::with_capacity(records.len() * FEATURE_COUNT);
        for (row, record) in records.iter().enumerate() {
            if record.features.len() != FEATURE_COUNT {
                return Err(AppError::Data(format!(
                    "Row {} has {} features, expected {}",
                    row,
                    record.features.len(),
                    FEATURE_COUNT
                )));
            }
            if let Some(idx) = record.features.iter().position(|v| !v.is_finite()) {
                return Err(AppError::Data(format!(
                    "Row {}: feature {} is not a finite number",
                    row, idx
                )));
            }
            flat.extend_from_slice(&record.features);
        }

        let features = Array2::from_shape_vec((records.len(), FEATURE_COUNT), flat)
            .map_err(|e| AppError::Data(format!("Failed to build feature matrix: {}", e)))?;
        let labels = records.iter().map(|r| r.churn).collect::<Array1<usize>>();

        Self::new(features, labels)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Rows selected by index, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Shuffle with a fixed seed and hold out `test_size` of the rows
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> (Self, Self) {
        let mut indices: Vec<usize> = (0..self.n_samples()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = (self.n_samples() as f64 * test_size).ceil() as usize;
        let n_test = n_test.min(self.n_samples().saturating_sub(1));
        let (test_idx, train_idx) = indices.split_at(n_test);

        (self.select(train_idx), self.select(test_idx))
    }
}

/// Binary evaluation metrics, positive class = churned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,

    /// Number of evaluated samples
    pub support: usize,

    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
}

impl ModelMetrics {
    /// Score predictions against the truth; undefined ratios count as zero
    pub fn evaluate(y_true: &[usize], y_pred: &[usize]) -> Self {
        let mut confusion = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let t = usize::from(t == 1);
            let p = usize::from(p == 1);
            confusion[t][p] += 1;
        }

        let [[tn, fp], [fn_count, tp]] = confusion;
        let support = y_true.len();

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_count);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(tp + tn, support),
            precision,
            recall,
            f1_score,
            support,
            confusion_matrix: confusion,
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Unique version of this artifact
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Held-out evaluation metrics
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bagged ensemble of decision trees
    RandomForest,

    /// Single decision tree
    DecisionTree,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::DecisionTree => write!(f, "Decision Tree"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<ProcessedRecord> {
        (0..n)
            .map(|i| ProcessedRecord {
                customer_id: format!("c{i}"),
                features: vec![i as f64, 0.0, 0.0, 1.0, 0.0, 0.0],
                churn: i % 2,
            })
            .collect()
    }

    #[test]
    fn test_dataset_from_records() {
        let dataset = TrainingDataset::from_records(&records(10)).unwrap();
        assert_eq!(dataset.n_samples(), 10);
        assert_eq!(dataset.n_features(), FEATURE_COUNT);
        assert_eq!(dataset.labels[3], 1);
        assert_eq!(dataset.features[[4, 0]], 4.0);
    }

    #[test]
    fn test_dataset_rejects_short_rows() {
        let mut rows = records(2);
        rows[1].features.pop();
        assert!(matches!(
            TrainingDataset::from_records(&rows),
            Err(AppError::Data(_))
        ));
    }

    #[test]
    fn test_train_test_split_is_seeded() {
        let dataset = TrainingDataset::from_records(&records(100)).unwrap();
        let (train, test) = dataset.train_test_split(0.2, 42);
        assert_eq!(train.n_samples(), 80);
        assert_eq!(test.n_samples(), 20);

        let (_, test_again) = dataset.train_test_split(0.2, 42);
        assert_eq!(test.features, test_again.features);
    }

    #[test]
    fn test_train_test_split_keeps_a_training_row() {
        let dataset = TrainingDataset::from_records(&records(1)).unwrap();
        let (train, test) = dataset.train_test_split(0.5, 42);
        assert_eq!(train.n_samples(), 1);
        assert_eq!(test.n_samples(), 0);
    }

    #[test]
    fn test_binary_metrics() {
        let y_true = [1, 1, 0, 0, 1];
        let y_pred = [1, 0, 0, 1, 1];
        let metrics = ModelMetrics::evaluate(&y_true, &y_pred);

        assert_eq!(metrics.confusion_matrix, [[1, 1], [1, 2]]);
        assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.f1_score - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.accuracy, 0.6);
    }

    #[test]
    fn test_metrics_zero_division() {
        let metrics = ModelMetrics::evaluate(&[0, 0], &[0, 0]);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
        assert_eq!(metrics.accuracy, 1.0);
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::RandomForest.to_string(), "Random Forest");
        assert_eq!(ModelType::DecisionTree.to_string(), "Decision Tree");
    }
}
