//! Disk-backed icon cache fed from the Pushover icon host.
//!
//! Resolution never blocks a notification: any failure here degrades
//! to an iconless notification at the dispatch layer.

use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::AssetError;

/// Icon asset resolution.
#[async_trait]
pub trait IconCache: Send + Sync {
    /// Resolve an icon key to a local file path, fetching and storing
    /// on a cache miss. `None` means no icon could be provided.
    async fn resolve(&self, key: &str) -> Option<PathBuf>;
}

/// Cache that keeps icons as plain files in a directory.
pub struct DiskIconCache {
    dir: PathBuf,
    http: Client,
    icon_url: String,
}

impl DiskIconCache {
    /// Create the cache, making sure the directory exists.
    ///
    /// # Errors
    /// Returns `AssetError` when the directory cannot be created or
    /// the HTTP client cannot be built.
    pub fn new(
        dir: PathBuf,
        icon_url: &str,
        request_timeout: Option<std::time::Duration>,
    ) -> Result<Self, AssetError> {
        fs::create_dir_all(&dir)?;

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            dir,
            http: builder.build()?,
            icon_url: icon_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_and_store(&self, key: &str) -> Result<PathBuf, AssetError> {
        let url = format!("{}/icons/{key}", self.icon_url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        self.store(key, &bytes)
    }

    /// Write icon bytes under the given key.
    ///
    /// # Errors
    /// Returns `AssetError` on an invalid key or filesystem failure.
    pub fn store(&self, key: &str, bytes: &Bytes) -> Result<PathBuf, AssetError> {
        let path = self.dir.join(validated_key(key)?);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[async_trait]
impl IconCache for DiskIconCache {
    async fn resolve(&self, key: &str) -> Option<PathBuf> {
        let file_name = match validated_key(key) {
            Ok(name) => name,
            Err(err) => {
                warn!(icon = key, error = %err, "Refusing icon key");
                return None;
            }
        };

        let path = self.dir.join(file_name);
        if path.exists() {
            return Some(path);
        }

        debug!(icon = key, "Caching image");
        match self.fetch_and_store(key).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(icon = key, error = %err, "Error while caching image");
                None
            }
        }
    }
}

/// Icon keys come from remote message payloads; only accept plain file
/// names so a hostile key cannot escape the cache directory.
fn validated_key(key: &str) -> Result<&str, AssetError> {
    let path = Path::new(key);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(key),
        _ => Err(AssetError::InvalidKey(key.to_string())),
    }
}
