//! Object storage collaborator used for profile media.
//!
//! Freshly uploaded objects are not always resolvable right away, so the
//! download URL lookup goes through the retry resolver while the upload
//! itself is attempted once.

mod error;
mod logger;

pub use error::{invalid_argument, no_download_url, StorageError, StorageErrorCode, StorageResult};

use async_trait::async_trait;
use bytes::Bytes;

use crate::util::backoff::{run_with_backoff, RetryError, RetryPolicy};
use logger::LOGGER;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadMetadata {
    pub content_type: String,
    pub cache_control: String,
}

impl UploadMetadata {
    pub fn new(content_type: Option<&str>) -> Self {
        Self {
            content_type: content_type
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

impl Default for UploadMetadata {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        metadata: &UploadMetadata,
    ) -> StorageResult<()>;

    async fn download_url(&self, path: &str) -> StorageResult<String>;
}

/// Collapses duplicate and surrounding slashes. Empty paths are rejected.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    let normalized = path
        .split('/')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if normalized.is_empty() {
        return Err(invalid_argument("Object path must not be empty."));
    }
    Ok(normalized)
}

/// Uploads `data` to `path` and returns its download URL.
///
/// `content_type` defaults to [`DEFAULT_CONTENT_TYPE`]. When every lookup
/// attempt fails, the error of the last attempt is returned.
pub async fn upload_and_resolve_url(
    store: &dyn ObjectStore,
    path: &str,
    data: impl Into<Bytes>,
    content_type: Option<&str>,
    policy: &RetryPolicy,
) -> StorageResult<String> {
    let path = normalize_path(path)?;
    let metadata = UploadMetadata::new(content_type);
    let data = data.into();

    LOGGER.debug(format!(
        "Uploading {} bytes to {path} as {}",
        data.len(),
        metadata.content_type
    ));
    store.put_object(&path, data, &metadata).await?;

    let object_path = path.as_str();
    run_with_backoff(policy, move |_attempt| store.download_url(object_path))
        .await
        .map_err(|err| match err {
            RetryError::InvalidPolicy(message) => invalid_argument(message),
            RetryError::Exhausted { last_error, .. } => last_error,
        })
}
