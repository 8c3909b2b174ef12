use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::metrics::TRAINING_RUNS_TOTAL;
use crate::ml::{
    artifact_digest, ChurnModel, Classifier, ClassifierModel, ModelMetadata, ModelMetrics,
    TrainingDataset,
};
use crate::storage::{ArtifactStore, ObjectLocation, TableStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub metadata: ModelMetadata,
    pub metrics: ModelMetrics,
    pub location: ObjectLocation,
    pub sha256: String,
}

impl TrainingReport {
    /// One-line held-out score summary
    pub fn summary(&self) -> String {
        format!(
            "Precision: {:.4}, Recall: {:.4}, F1-Score: {:.4}",
            self.metrics.precision, self.metrics.recall, self.metrics.f1_score
        )
    }
}

/// Processed table → seeded split → fit → evaluate → artifact
pub struct Trainer {
    tables: Arc<dyn TableStore>,
    artifacts: Arc<dyn ArtifactStore>,
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(
        tables: Arc<dyn TableStore>,
        artifacts: Arc<dyn ArtifactStore>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            tables,
            artifacts,
            config,
        }
    }

    fn hyperparameters(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("n_trees".to_string(), self.config.n_trees.to_string());
        params.insert(
            "max_depth".to_string(),
            self.config
                .max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        params.insert("seed".to_string(), self.config.seed.to_string());
        params.insert("test_size".to_string(), self.config.test_size.to_string());
        params
    }

    pub async fn run(&self, table: &str, model_key: &str) -> Result<TrainingReport> {
        if !(0.0..1.0).contains(&self.config.test_size) {
            return Err(AppError::Validation(format!(
                "test_size must be in [0, 1), got {}",
                self.config.test_size
            )));
        }

        let processed = self.tables.load_table(table).await?;
        let dataset = TrainingDataset::from_records(&processed.records)?;
        if dataset.n_samples() == 0 {
            return Err(AppError::Data(format!("Table '{}' has no rows", table)));
        }

        let (train, test) = dataset.train_test_split(self.config.test_size, self.config.seed);
        info!(
            table,
            model_type = %self.config.model_type,
            train_samples = train.n_samples(),
            test_samples = test.n_samples(),
            "Training model"
        );

        let config = self.config.clone();
        let n_training_samples = train.n_samples();
        let (classifier, metrics) = tokio::task::spawn_blocking(move || {
            fit_and_evaluate(&config, &train, &test)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Training task failed: {}", e)))??;

        if metrics.support == 0 {
            warn!("No held-out rows, evaluation metrics are zero");
        }

        let metadata = ModelMetadata {
            name: "churn".to_string(),
            version: uuid::Uuid::new_v4().to_string(),
            model_type: self.config.model_type,
            trained_at: chrono::Utc::now(),
            n_training_samples,
            n_features: dataset.n_features(),
            validation_metrics: Some(metrics.clone()),
            hyperparameters: self.hyperparameters(),
        };

        let model = ChurnModel::new(metadata.clone(), processed.normalizer, classifier);
        let bytes = model.to_bytes()?;
        let sha256 = artifact_digest(&bytes);
        let location = self.artifacts.location(model_key);

        self.artifacts.put(model_key, bytes).await?;

        TRAINING_RUNS_TOTAL
            .with_label_values(&[&self.config.model_type.to_string()])
            .inc();
        info!(
            version = %metadata.version,
            uri = %location.uri,
            sha256 = %sha256,
            precision = metrics.precision,
            recall = metrics.recall,
            f1_score = metrics.f1_score,
            "Model artifact saved"
        );

        Ok(TrainingReport {
            metadata,
            metrics,
            location,
            sha256,
        })
    }
}

fn fit_and_evaluate(
    config: &TrainingConfig,
    train: &TrainingDataset,
    test: &TrainingDataset,
) -> Result<(ClassifierModel, ModelMetrics)> {
    let mut classifier =
        ClassifierModel::new(config.model_type, config.n_trees, config.max_depth, config.seed);
    classifier.fit(train)?;

    let metrics = if test.n_samples() == 0 {
        ModelMetrics::evaluate(&[], &[])
    } else {
        let predictions = classifier.predict(&test.features)?;
        ModelMetrics::evaluate(&test.labels.to_vec(), &predictions)
    };

    Ok((classifier, metrics))
}
