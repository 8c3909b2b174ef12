//! Prometheus metrics for the prediction service and the offline jobs.
//!
//! All collectors live in one process-wide registry and are exported in
//! the text exposition format by `GET /metrics`.

mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

const NAMESPACE: &str = "churn_predictor";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Prediction Metrics
    // ============================================================================

    /// Labels: label
    pub static ref PREDICTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("predictions_total", "Total number of predictions served")
            .namespace(NAMESPACE),
        &["label"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Labels: code
    pub static ref PREDICTION_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed predictions")
            .namespace(NAMESPACE),
        &["code"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    pub static ref PREDICTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Time spent encoding and classifying one request"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["model_type"]
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    // ============================================================================
    // Model Lifecycle Metrics
    // ============================================================================

    /// Labels: result (success, failure)
    pub static ref MODEL_LOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("model_loads_total", "Model artifact fetch-and-decode attempts")
            .namespace(NAMESPACE),
        &["result"]
    ).expect("Failed to create MODEL_LOADS_TOTAL metric");

    /// 1 when a model is resident
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a model is loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    // ============================================================================
    // Offline Job Metrics
    // ============================================================================

    pub static ref ETL_ROWS_PROCESSED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("etl_rows_processed_total", "Rows written to the processed table")
            .namespace(NAMESPACE)
    ).expect("Failed to create ETL_ROWS_PROCESSED_TOTAL metric");

    /// Labels: model_type
    pub static ref TRAINING_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("training_runs_total", "Completed training runs")
            .namespace(NAMESPACE),
        &["model_type"]
    ).expect("Failed to create TRAINING_RUNS_TOTAL metric");
}

fn register<C: prometheus::core::Collector + 'static>(collector: C) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(Box::new(collector)) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(HTTP_REQUESTS_TOTAL.clone())?;
    register(HTTP_REQUEST_DURATION_SECONDS.clone())?;

    register(PREDICTIONS_TOTAL.clone())?;
    register(PREDICTION_ERRORS_TOTAL.clone())?;
    register(PREDICTION_DURATION_SECONDS.clone())?;

    register(MODEL_LOADS_TOTAL.clone())?;
    register(MODEL_LOADED.clone())?;

    register(ETL_ROWS_PROCESSED_TOTAL.clone())?;
    register(TRAINING_RUNS_TOTAL.clone())?;

    tracing::info!("Prometheus metrics registered");
    Ok(())
}

/// Encode the registry in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
