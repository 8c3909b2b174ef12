use churn_predictor::{
    api::{build_router, AppState},
    config::Config,
    logging::init_tracing,
    ml::PredictionService,
    storage::create_artifact_store,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::load_defaults()?, Some(e)),
    };

    init_tracing(&config.observability);
    if let Some(e) = config_error {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::warn!("Using default configuration");
    }

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = churn_predictor::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    // Initialize artifact storage
    tracing::info!("Storage backend: {:?}", config.storage.backend);
    let store = create_artifact_store(&config.storage)?;

    let service = Arc::new(PredictionService::new(
        store,
        config.storage.model_key.clone(),
        config.serving.input_scaling,
    ));
    tracing::info!(
        location = %service.location().uri,
        input_scaling = ?config.serving.input_scaling,
        "✅ Prediction service initialized"
    );

    // A missing model is not fatal; predict retries the load lazily.
    if config.serving.preload {
        match service.load().await {
            Ok(loaded) => tracing::info!(
                version = %loaded.model.metadata.version,
                "✅ Model preloaded"
            ),
            Err(e) => tracing::warn!("⚠️  Model preload failed: {}", e),
        }
    }

    let state = AppState::new(service).with_metrics(config.observability.prometheus_enabled);
    let app = build_router(state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
