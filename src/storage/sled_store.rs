use crate::error::{AppError, Result};
use crate::storage::{ProcessedTable, TableStore};
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Processed tables in a Sled embedded database, one bincode blob per table
#[derive(Clone)]
pub struct SledTableStore {
    db: Arc<Db>,
    tables_tree: sled::Tree,
}

impl SledTableStore {
    /// Open (or create) the database at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let tables_tree = db.open_tree("tables").map_err(|e| {
            AppError::Storage(format!("Failed to open tables tree: {}", e))
        })?;

        tracing::info!("Initialized Sled table store at {:?}", path.as_ref());

        Ok(Self {
            db: Arc::new(db),
            tables_tree,
        })
    }

    fn serialize_table(table: &ProcessedTable) -> Result<Vec<u8>> {
        bincode::serialize(table)
            .map_err(|e| AppError::Storage(format!("Failed to serialize table: {}", e)))
    }

    fn deserialize_table(bytes: &[u8]) -> Result<ProcessedTable> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Storage(format!("Failed to deserialize table: {}", e)))
    }

    fn read(&self, name: &str) -> Result<Option<ProcessedTable>> {
        self.tables_tree
            .get(name.as_bytes())
            .map_err(|e| AppError::Storage(format!("Failed to read table '{}': {}", name, e)))?
            .map(|bytes| Self::deserialize_table(&bytes))
            .transpose()
    }
}

#[async_trait]
impl TableStore for SledTableStore {
    async fn replace_table(&self, name: &str, table: &ProcessedTable) -> Result<()> {
        let bytes = Self::serialize_table(table)?;

        // A single insert swaps the whole table, readers see old or new rows only.
        self.tables_tree
            .insert(name.as_bytes(), bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write table '{}': {}", name, e)))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to flush database: {}", e)))?;

        tracing::debug!(table = name, rows = table.records.len(), "Table replaced");
        Ok(())
    }

    async fn load_table(&self, name: &str) -> Result<ProcessedTable> {
        self.read(name)?
            .ok_or_else(|| AppError::NotFound(format!("Table '{}' does not exist", name)))
    }

    async fn count_rows(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.read(name)?.map(|table| table.records.len()))
    }
}
