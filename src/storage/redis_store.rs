use crate::error::{AppError, Result};
use crate::storage::{ProcessedTable, TableStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Processed tables in Redis, one bincode blob per table key
#[derive(Clone)]
pub struct RedisTableStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisTableStore {
    /// Connect with the default key prefix
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::new_with_prefix(redis_url, "churn").await
    }

    /// Connect with a custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AppError::Storage(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        // Test connection
        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| AppError::Storage(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis table store with prefix '{}'", prefix);

        Ok(Self {
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    fn table_key(&self, name: &str) -> String {
        format!("{}:table:{}", self.key_prefix, name)
    }

    async fn read(&self, name: &str) -> Result<Option<ProcessedTable>> {
        let mut conn = self.connection.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(self.table_key(name))
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read table '{}': {}", name, e)))?;

        bytes
            .map(|b| {
                bincode::deserialize(&b).map_err(|e| {
                    AppError::Storage(format!("Failed to deserialize table '{}': {}", name, e))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl TableStore for RedisTableStore {
    async fn replace_table(&self, name: &str, table: &ProcessedTable) -> Result<()> {
        let bytes = bincode::serialize(table)
            .map_err(|e| AppError::Storage(format!("Failed to serialize table: {}", e)))?;

        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.table_key(name), bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write table '{}': {}", name, e)))?;

        tracing::debug!(table = name, rows = table.records.len(), "Table replaced");
        Ok(())
    }

    async fn load_table(&self, name: &str) -> Result<ProcessedTable> {
        self.read(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Table '{}' does not exist", name)))
    }

    async fn count_rows(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.read(name).await?.map(|table| table.records.len()))
    }
}
