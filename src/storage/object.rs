use crate::error::{AppError, Result};
use crate::storage::{ArtifactStore, ObjectLocation};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Artifacts as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a key below the root, refusing keys that escape it
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::Storage(format!("Invalid object key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), size = bytes.len(), "Object read");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
                format!("Object {} does not exist", path.display()),
            )),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so readers never see a torn file.
        let mut staging_name = path.as_os_str().to_os_string();
        staging_name.push(".partial");
        let staging = PathBuf::from(staging_name);
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Object written");
        Ok(())
    }

    fn location(&self, key: &str) -> ObjectLocation {
        ObjectLocation {
            bucket: None,
            key: key.to_string(),
            uri: format!("file://{}", self.root.join(key).display()),
        }
    }
}

/// Objects behind a plain HTTP GET/PUT interface at
/// `{endpoint}/{bucket}/{key}`, e.g. an S3-compatible gateway or
/// presigning proxy.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Storage(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ArtifactStore for HttpObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.url(key);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("GET {} failed: {}", url, e)))?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| AppError::Storage(format!("GET {} body failed: {}", url, e)))?;
                tracing::debug!(url = %url, size = bytes.len(), "Object fetched");
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "Object {} does not exist",
                url
            ))),
            status => Err(AppError::Storage(format!(
                "GET {} returned {}",
                url, status
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.url(key);
        let size = bytes.len();
        let response = self
            .authorize(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("PUT {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "PUT {} returned {}",
                url,
                response.status()
            )));
        }

        tracing::debug!(url = %url, size, "Object uploaded");
        Ok(())
    }

    fn location(&self, key: &str) -> ObjectLocation {
        ObjectLocation {
            bucket: Some(self.bucket.clone()),
            key: key.to_string(),
            uri: self.url(key),
        }
    }
}

/// Process-local object store (for testing and development)
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    objects: Arc<DashMap<String, Vec<u8>>>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful and failed `get` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("Object memory://{} does not exist", key)))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn location(&self, key: &str) -> ObjectLocation {
        ObjectLocation {
            bucket: None,
            key: key.to_string(),
            uri: format!("memory://{}", key),
        }
    }
}
