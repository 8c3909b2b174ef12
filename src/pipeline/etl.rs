use crate::error::{AppError, Result};
use crate::metrics::ETL_ROWS_PROCESSED_TOTAL;
use crate::ml::{FeatureEncoder, Normalizer, ScalingMethod};
use crate::pipeline::csv::read_raw_records;
use crate::storage::{ArtifactStore, ProcessedTable, TableStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Where the raw CSV comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtlSource {
    /// Key in the artifact store
    Object(String),
    /// Path on local disk
    File(PathBuf),
}

impl fmt::Display for EtlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtlSource::Object(key) => write!(f, "object:{}", key),
            EtlSource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Summary of one ETL run
#[derive(Debug, Clone)]
pub struct EtlReport {
    pub source: String,
    pub table: String,
    pub rows: usize,
    pub normalizer: Normalizer,
}

/// Raw CSV → forward fill → one-hot → normalize → replace processed table
pub struct EtlJob {
    artifacts: Arc<dyn ArtifactStore>,
    tables: Arc<dyn TableStore>,
    encoder: FeatureEncoder,
}

impl EtlJob {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        tables: Arc<dyn TableStore>,
        scaling: ScalingMethod,
    ) -> Self {
        Self {
            artifacts,
            tables,
            encoder: FeatureEncoder::new(scaling),
        }
    }

    async fn read_source(&self, source: &EtlSource) -> Result<Vec<u8>> {
        match source {
            EtlSource::Object(key) => self.artifacts.get(key).await,
            EtlSource::File(path) => tokio::fs::read(path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AppError::NotFound(format!("Input file {} does not exist", path.display()))
                }
                _ => AppError::Io(e),
            }),
        }
    }

    pub async fn run(&self, source: &EtlSource, table: &str) -> Result<EtlReport> {
        let start = Instant::now();
        info!(source = %source, table, scaling = %self.encoder.scaling(), "Starting ETL job");

        let bytes = self.read_source(source).await?;
        let raw = read_raw_records(bytes)?;
        info!(rows = raw.len(), "Raw data loaded");

        let (records, normalizer) = self.encoder.fit_transform(raw)?;
        let rows = records.len();

        let processed = ProcessedTable {
            records,
            normalizer: normalizer.clone(),
        };
        self.tables.replace_table(table, &processed).await?;

        ETL_ROWS_PROCESSED_TOTAL.inc_by(rows as u64);
        info!(
            rows,
            table,
            duration_ms = start.elapsed().as_millis() as u64,
            "Processed data written"
        );

        Ok(EtlReport {
            source: source.to_string(),
            table: table.to_string(),
            rows,
            normalizer,
        })
    }
}
