pub mod factory;
pub mod object;
pub mod redis_store;
pub mod sled_store;
pub mod store;

pub use factory::{create_artifact_store, create_table_store};
pub use object::{HttpObjectStore, InMemoryArtifactStore, LocalArtifactStore};
pub use redis_store::RedisTableStore;
pub use sled_store::SledTableStore;
pub use store::InMemoryTableStore;

use crate::error::Result;
use crate::ml::Normalizer;
use crate::models::ProcessedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where an object lives, for logs and the load-model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: Option<String>,
    pub key: String,
    pub uri: String,
}

/// Byte storage for model artifacts and raw input files
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an object; `AppError::NotFound` when absent
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an object
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Coordinates of `key` in this store
    fn location(&self, key: &str) -> ObjectLocation;
}

/// Contents of a processed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTable {
    pub records: Vec<ProcessedRecord>,

    /// Statistics the records were normalized with
    pub normalizer: Normalizer,
}

/// Record store holding processed tables
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replace the table wholesale
    async fn replace_table(&self, name: &str, table: &ProcessedTable) -> Result<()>;

    /// Read a table; `AppError::NotFound` when it was never written
    async fn load_table(&self, name: &str) -> Result<ProcessedTable>;

    /// Number of rows, or `None` when the table does not exist
    async fn count_rows(&self, name: &str) -> Result<Option<usize>>;
}
