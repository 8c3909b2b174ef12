//! Insurance churn prediction: CSV ETL into a record store, random-forest
//! training into a versioned artifact, and a prediction service exposed over
//! HTTP and serverless event envelopes.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod serverless;
pub mod storage;

pub use error::{AppError, Result};
