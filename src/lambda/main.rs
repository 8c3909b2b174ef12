use churn_predictor::{
    config::Config, logging::init_tracing, ml::PredictionService, serverless::RuntimeClient,
    storage::create_artifact_store,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config.observability);

    let runtime_api = std::env::var("AWS_LAMBDA_RUNTIME_API")
        .map_err(|_| anyhow::anyhow!("AWS_LAMBDA_RUNTIME_API is not set"))?;

    let store = create_artifact_store(&config.storage)?;
    let service = Arc::new(PredictionService::new(
        store,
        config.storage.model_key.clone(),
        config.serving.input_scaling,
    ));

    // Cold start: load once per container, later invocations reuse it.
    if config.serving.preload {
        if let Err(e) = service.load().await {
            tracing::warn!("Model preload failed, will retry on first invocation: {}", e);
        }
    }

    let runtime = RuntimeClient::new(&runtime_api);
    tracing::info!(runtime_api = %runtime_api, "Serverless runtime loop started");

    loop {
        if let Err(e) = runtime.poll(&service).await {
            tracing::error!("Invocation loop error: {}", e);
        }
    }
}
