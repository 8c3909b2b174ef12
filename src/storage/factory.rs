use crate::config::{DatabaseConfig, DatabaseEngine, StorageBackend, StorageConfig};
use crate::error::{AppError, Result};
use crate::storage::{
    ArtifactStore, HttpObjectStore, InMemoryArtifactStore, InMemoryTableStore,
    LocalArtifactStore, RedisTableStore, SledTableStore, TableStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Create an artifact store based on configuration
pub fn create_artifact_store(config: &StorageConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        StorageBackend::Local => {
            tracing::info!(root = ?config.root, "Initializing local artifact storage");
            Ok(Arc::new(LocalArtifactStore::new(&config.root)))
        }

        StorageBackend::Http => {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Http storage backend requires 'endpoint' configuration".to_string(),
                )
            })?;

            let token = config
                .token_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok());

            tracing::info!(
                endpoint = %endpoint,
                bucket = %config.bucket,
                authenticated = token.is_some(),
                "Initializing HTTP object storage"
            );

            let store = HttpObjectStore::new(
                endpoint,
                &config.bucket,
                token,
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(store))
        }

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory artifact storage, artifacts are lost on exit");
            Ok(Arc::new(InMemoryArtifactStore::new()))
        }
    }
}

/// Create a table store based on configuration
pub async fn create_table_store(config: &DatabaseConfig) -> Result<Arc<dyn TableStore>> {
    match config.engine {
        DatabaseEngine::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled engine requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled table storage");

            let store = SledTableStore::new(path)?;
            Ok(Arc::new(store))
        }

        DatabaseEngine::Redis => {
            let redis_url = config.redis_url();

            tracing::info!(host = %config.host, port = config.port, db = config.db, "Initializing Redis table storage");

            let store = RedisTableStore::new_with_prefix(&redis_url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }

        DatabaseEngine::Memory => {
            tracing::warn!("Using in-memory table storage, processed data is lost on exit");
            Ok(Arc::new(InMemoryTableStore::new()))
        }
    }
}
