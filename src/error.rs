use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or incomplete request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A feature field is still null after forward fill
    #[error("Missing value for '{field}' in row {row}")]
    MissingValue { row: usize, field: String },

    /// Malformed CSV or processed table contents
    #[error("Data error: {0}")]
    Data(String),

    /// Object store or record store unreachable or failing
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object or table does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Model artifact could not be fetched or decoded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The classifier failed while predicting
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// The classifier failed while fitting
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MissingValue { .. } => StatusCode::BAD_REQUEST,
            AppError::Data(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MissingValue { .. } => "MISSING_VALUE",
            AppError::Data(_) => "DATA_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON body shared by the HTTP and serverless surfaces
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "error": self.to_string(),
            "code": self.error_code(),
        })
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(
                error_code = self.error_code(),
                status_code = status.as_u16(),
                message = %self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = self.error_code(),
                status_code = status.as_u16(),
                message = %self,
                "Request rejected"
            );
        }

        (status, Json(self.to_body())).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
