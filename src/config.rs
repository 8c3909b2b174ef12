use crate::ml::{ModelType, ScalingMethod};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Object storage for model artifacts and input CSVs
    pub storage: StorageConfig,

    /// Record store for the processed table
    pub database: DatabaseConfig,

    /// Training configuration
    pub training: TrainingConfig,

    /// ETL configuration
    #[serde(default)]
    pub etl: EtlConfig,

    /// Serving configuration
    #[serde(default)]
    pub serving: ServingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/churn.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CHURN__)
            .add_source(
                config::Environment::with_prefix("CHURN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only, ignoring files and environment
    pub fn load_defaults() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                DEFAULT_CONFIG,
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Artifact backend type
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Base URL of the object service for the http backend
    pub endpoint: Option<String>,

    /// Bucket holding the artifacts
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Environment variable holding a bearer token for the http backend
    pub token_env: Option<String>,

    /// Key of the model artifact
    #[serde(default = "default_model_key")]
    pub model_key: String,

    /// Key of the raw input CSV
    #[serde(default = "default_input_key")]
    pub input_key: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Http,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Record store engine
    #[serde(default)]
    pub engine: DatabaseEngine,

    /// Path for the embedded database
    pub path: Option<PathBuf>,

    /// Redis host
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Redis logical database
    #[serde(default)]
    pub db: i64,

    /// Redis username
    pub username: Option<String>,

    /// Redis password (from env var)
    pub password_env: Option<String>,

    /// Name of the processed table
    #[serde(default = "default_table")]
    pub table: String,

    /// Key prefix for the redis engine
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl DatabaseConfig {
    /// Connection URL for the redis engine
    pub fn redis_url(&self) -> String {
        let password = self
            .password_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());

        let credentials = match (&self.username, password) {
            (Some(user), Some(pass)) => format!("{}:{}@", user, pass),
            (None, Some(pass)) => format!(":{}@", pass),
            (Some(user), None) => format!("{}@", user),
            (None, None) => String::new(),
        };

        format!(
            "redis://{}{}:{}/{}",
            credentials, self.host, self.port, self.db
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseEngine {
    #[default]
    Sled,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Classifier family
    #[serde(default = "default_model_type")]
    pub model_type: ModelType,

    /// Number of trees in the forest
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth (unbounded when absent)
    pub max_depth: Option<usize>,

    /// Seed for the split shuffle and bootstrap samples
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            n_trees: default_n_trees(),
            max_depth: None,
            seed: default_seed(),
            test_size: default_test_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Numeric normalization method
    #[serde(default)]
    pub scaling: ScalingMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Whether submitted numeric fields are raw or already scaled
    #[serde(default)]
    pub input_scaling: InputScaling,

    /// Load the model at startup instead of on first request
    #[serde(default = "default_true")]
    pub preload: bool,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            input_scaling: InputScaling::default(),
            preload: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputScaling {
    /// Apply the artifact's normalizer to submitted numeric fields
    #[default]
    Raw,
    /// Submitted numeric fields are already scaled by the caller
    Prescaled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/artifacts")
}

fn default_bucket() -> String {
    "churn-models".to_string()
}

fn default_model_key() -> String {
    "model.bin".to_string()
}

fn default_input_key() -> String {
    "insurance_data.csv".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_port() -> u16 {
    6379
}

fn default_table() -> String {
    "processed_insurance_data".to_string()
}

fn default_key_prefix() -> String {
    "churn".to_string()
}

fn default_model_type() -> ModelType {
    ModelType::RandomForest
}

fn default_n_trees() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "churn-predictor".to_string()
}

fn default_true() -> bool {
    true
}
