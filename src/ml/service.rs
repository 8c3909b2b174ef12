use crate::config::InputScaling;
use crate::error::{AppError, Result};
use crate::metrics::{
    MODEL_LOADED, MODEL_LOADS_TOTAL, PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS,
    PREDICTION_ERRORS_TOTAL,
};
use crate::ml::artifact::{artifact_digest, ChurnModel};
use crate::ml::features::FeatureVector;
use crate::ml::models::{ModelMetadata, PredictionOutcome};
use crate::models::{FeaturesPayload, LoadModelResponse, PredictRequest, PredictResponse};
use crate::storage::{ArtifactStore, ObjectLocation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use validator::Validate;

/// Lifecycle of the prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, serde::Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Uninitialized,
    ModelLoaded,
}

/// A decoded artifact and where it came from
pub struct LoadedModel {
    pub model: ChurnModel,
    pub location: ObjectLocation,
    pub sha256: String,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Serves predictions from the model artifact at a fixed key.
///
/// The model is fetched at most once per explicit `load`/`reload`; a
/// `predict` on an uninitialized service loads it lazily. Loads are
/// serialized, and a failed reload keeps the previous model.
pub struct PredictionService {
    store: Arc<dyn ArtifactStore>,
    model_key: String,
    input_scaling: InputScaling,
    current: RwLock<Option<Arc<LoadedModel>>>,
    load_lock: Mutex<()>,
    load_count: AtomicU64,
}

impl PredictionService {
    pub fn new(store: Arc<dyn ArtifactStore>, model_key: impl Into<String>, input_scaling: InputScaling) -> Self {
        Self {
            store,
            model_key: model_key.into(),
            input_scaling,
            current: RwLock::new(None),
            load_count: AtomicU64::new(0),
            load_lock: Mutex::new(()),
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ServiceState {
        if self.current.read().await.is_some() {
            ServiceState::ModelLoaded
        } else {
            ServiceState::Uninitialized
        }
    }

    /// Number of successful artifact fetches since start
    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Location of the artifact this service reads
    pub fn location(&self) -> ObjectLocation {
        self.store.location(&self.model_key)
    }

    pub fn input_scaling(&self) -> InputScaling {
        self.input_scaling
    }

    /// The resident model, if any
    pub async fn current(&self) -> Option<Arc<LoadedModel>> {
        self.current.read().await.clone()
    }

    pub async fn metadata(&self) -> Option<ModelMetadata> {
        self.current().await.map(|loaded| loaded.model.metadata.clone())
    }

    /// Load the model unless one is already resident
    pub async fn load(&self) -> Result<Arc<LoadedModel>> {
        if let Some(loaded) = self.current().await {
            return Ok(loaded);
        }

        let _guard = self.load_lock.lock().await;

        // Another caller may have finished loading while we waited.
        if let Some(loaded) = self.current().await {
            return Ok(loaded);
        }

        let loaded = Arc::new(self.fetch().await?);
        *self.current.write().await = Some(loaded.clone());
        Ok(loaded)
    }

    /// Fetch the artifact again and swap it in; on failure the resident
    /// model (if any) keeps serving.
    pub async fn reload(&self) -> Result<Arc<LoadedModel>> {
        let _guard = self.load_lock.lock().await;

        let loaded = Arc::new(self.fetch().await?);
        let previous = self.current.write().await.replace(loaded.clone());

        match previous {
            Some(old) if old.sha256 != loaded.sha256 => info!(
                old_version = %old.model.metadata.version,
                new_version = %loaded.model.metadata.version,
                "Model replaced"
            ),
            Some(_) => debug!("Reloaded identical model artifact"),
            None => {}
        }

        Ok(loaded)
    }

    /// Validate, encode, and classify one request
    pub async fn predict(&self, payload: &FeaturesPayload) -> Result<PredictionOutcome> {
        let result = self.predict_inner(payload).await;

        match &result {
            Ok(outcome) => PREDICTIONS_TOTAL
                .with_label_values(&[&outcome.label.to_string()])
                .inc(),
            Err(e) => PREDICTION_ERRORS_TOTAL
                .with_label_values(&[e.error_code()])
                .inc(),
        }

        result
    }

    /// Request/response contract shared by the HTTP route and the
    /// serverless adapter
    pub async fn predict_request(&self, request: &PredictRequest) -> Result<PredictResponse> {
        request.validate()?;
        let features = request
            .features
            .as_ref()
            .ok_or_else(|| AppError::Validation("missing 'features' object".to_string()))?;

        let outcome = self.predict(features).await?;
        Ok(PredictResponse {
            prediction: outcome.label,
            probability: outcome.probabilities,
        })
    }

    /// Force a reload and describe what is now serving
    pub async fn reload_response(&self) -> Result<LoadModelResponse> {
        let loaded = self.reload().await?;
        Ok(LoadModelResponse {
            status: "loaded".to_string(),
            location: loaded.location.uri.clone(),
            bucket: loaded.location.bucket.clone(),
            key: loaded.location.key.clone(),
            model_version: loaded.model.metadata.version.clone(),
            artifact_sha256: loaded.sha256.clone(),
        })
    }

    async fn predict_inner(&self, payload: &FeaturesPayload) -> Result<PredictionOutcome> {
        let vector = FeatureVector::try_from(payload)?;
        let loaded = self.load().await?;

        let start = Instant::now();
        let input = match self.input_scaling {
            InputScaling::Raw => loaded.model.normalizer.apply(&vector),
            InputScaling::Prescaled => vector,
        };
        let outcome = loaded.model.predict(&input)?;

        PREDICTION_DURATION_SECONDS
            .with_label_values(&[&loaded.model.metadata.model_type.to_string()])
            .observe(start.elapsed().as_secs_f64());

        debug!(label = outcome.label, "Prediction served");
        Ok(outcome)
    }

    async fn fetch(&self) -> Result<LoadedModel> {
        let location = self.location();
        info!(uri = %location.uri, "Fetching model artifact");

        let result = self.fetch_and_decode(&location).await;
        match &result {
            Ok(loaded) => {
                self.load_count.fetch_add(1, Ordering::SeqCst);
                MODEL_LOADS_TOTAL.with_label_values(&["success"]).inc();
                MODEL_LOADED.set(1.0);
                info!(
                    version = %loaded.model.metadata.version,
                    model_type = %loaded.model.metadata.model_type,
                    sha256 = %loaded.sha256,
                    "Model loaded"
                );
            }
            Err(e) => {
                MODEL_LOADS_TOTAL.with_label_values(&["failure"]).inc();
                warn!(uri = %location.uri, error = %e, "Model load failed");
            }
        }
        result
    }

    async fn fetch_and_decode(&self, location: &ObjectLocation) -> Result<LoadedModel> {
        let bytes = self.store.get(&self.model_key).await.map_err(|e| {
            AppError::ModelUnavailable(format!("Failed to fetch {}: {}", location.uri, e))
        })?;

        let sha256 = artifact_digest(&bytes);
        let model = ChurnModel::from_bytes(&bytes)?;

        Ok(LoadedModel {
            model,
            location: location.clone(),
            sha256,
            loaded_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::{Classifier, ClassifierModel};
    use crate::ml::features::{Normalizer, ScalingMethod};
    use crate::ml::models::{ModelType, TrainingDataset};
    use crate::storage::InMemoryArtifactStore;
    use ndarray::{Array1, Array2};
    use std::collections::HashMap;

    fn always_zero_artifact(version: &str) -> Vec<u8> {
        let dataset =
            TrainingDataset::new(Array2::from_elem((6, 6), 0.5), Array1::zeros(6)).unwrap();
        let mut classifier = ClassifierModel::new(ModelType::RandomForest, 3, None, 7);
        classifier.fit(&dataset).unwrap();

        let normalizer = Normalizer::fit(
            ScalingMethod::MinMax,
            &[
                FeatureVector::new([18.0, 100.0, 0.0, 1.0, 0.0, 0.0]),
                FeatureVector::new([80.0, 2000.0, 5.0, 0.0, 0.0, 1.0]),
            ],
        )
        .unwrap();

        let metadata = ModelMetadata {
            name: "churn".to_string(),
            version: version.to_string(),
            model_type: ModelType::RandomForest,
            trained_at: chrono::Utc::now(),
            n_training_samples: 6,
            n_features: 6,
            validation_metrics: None,
            hyperparameters: HashMap::new(),
        };

        ChurnModel::new(metadata, normalizer, classifier)
            .to_bytes()
            .unwrap()
    }

    fn payload() -> FeaturesPayload {
        FeaturesPayload {
            age: Some(35.0),
            annual_premium: Some(1200.0),
            claims_count: Some(1.0),
            policy_auto: Some(1.0),
            policy_home: Some(0.0),
            policy_life: Some(0.0),
        }
    }

    async fn service_with_model() -> (PredictionService, InMemoryArtifactStore) {
        let store = InMemoryArtifactStore::new();
        store.put("model.bin", always_zero_artifact("v1")).await.unwrap();
        let service = PredictionService::new(Arc::new(store.clone()), "model.bin", InputScaling::Raw);
        (service, store)
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let (service, store) = service_with_model().await;
        assert_eq!(service.state().await, ServiceState::Uninitialized);
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let (service, store) = service_with_model().await;

        service.load().await.unwrap();
        service.load().await.unwrap();

        assert_eq!(service.state().await, ServiceState::ModelLoaded);
        assert_eq!(service.load_count(), 1);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_predict_loads_lazily_once() {
        let (service, store) = service_with_model().await;

        let first = service.predict(&payload()).await.unwrap();
        let second = service.predict(&payload()).await.unwrap();

        assert_eq!(first.label, 0);
        assert_eq!(first.probabilities, Some(vec![vec![1.0, 0.0]]));
        assert_eq!(first, second);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected_before_loading() {
        let (service, store) = service_with_model().await;
        let mut incomplete = payload();
        incomplete.claims_count = None;

        match service.predict(&incomplete).await {
            Err(AppError::Validation(msg)) => assert!(msg.contains("claims_count")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_unavailable() {
        let store = InMemoryArtifactStore::new();
        let service = PredictionService::new(Arc::new(store), "model.bin", InputScaling::Raw);

        assert!(matches!(
            service.predict(&payload()).await,
            Err(AppError::ModelUnavailable(_))
        ));
        assert_eq!(service.state().await, ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_reload_swaps_model() {
        let (service, store) = service_with_model().await;
        service.load().await.unwrap();

        store.put("model.bin", always_zero_artifact("v2")).await.unwrap();
        let loaded = service.reload().await.unwrap();

        assert_eq!(loaded.model.metadata.version, "v2");
        assert_eq!(service.metadata().await.unwrap().version, "v2");
        assert_eq!(service.load_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_model() {
        let (service, store) = service_with_model().await;
        service.load().await.unwrap();

        store.put("model.bin", b"garbage".to_vec()).await.unwrap();
        assert!(matches!(
            service.reload().await,
            Err(AppError::ModelUnavailable(_))
        ));

        assert_eq!(service.state().await, ServiceState::ModelLoaded);
        assert_eq!(service.metadata().await.unwrap().version, "v1");
        assert!(service.predict(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_request_without_features_is_rejected() {
        let (service, _) = service_with_model().await;
        let request = PredictRequest { features: None };

        assert!(matches!(
            service.predict_request(&request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_indicator_out_of_range_is_rejected() {
        let (service, _) = service_with_model().await;
        let mut features = payload();
        features.policy_home = Some(2.0);
        let request = PredictRequest {
            features: Some(features),
        };

        assert!(matches!(
            service.predict_request(&request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_response_describes_artifact() {
        let (service, _) = service_with_model().await;
        let response = service.reload_response().await.unwrap();

        assert_eq!(response.status, "loaded");
        assert_eq!(response.key, "model.bin");
        assert_eq!(response.location, "memory://model.bin");
        assert_eq!(response.model_version, "v1");
        assert_eq!(response.artifact_sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let (service, store) = service_with_model().await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.load().await.map(|_| ()) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.fetch_count(), 1);
    }
}
