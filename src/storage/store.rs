use crate::error::{AppError, Result};
use crate::storage::{ProcessedTable, TableStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory table store (for testing and development)
#[derive(Clone, Default)]
pub struct InMemoryTableStore {
    tables: Arc<DashMap<String, ProcessedTable>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn replace_table(&self, name: &str, table: &ProcessedTable) -> Result<()> {
        self.tables.insert(name.to_string(), table.clone());
        tracing::debug!(table = name, rows = table.records.len(), "Table replaced");
        Ok(())
    }

    async fn load_table(&self, name: &str) -> Result<ProcessedTable> {
        self.tables
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("Table '{}' does not exist", name)))
    }

    async fn count_rows(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.tables.get(name).map(|entry| entry.records.len()))
    }
}
