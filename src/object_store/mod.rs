mod cached;
mod gcs;
mod local;

pub use cached::CachedStore;
pub use gcs::GcsStore;
pub use local::LocalStore;

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Range {start}-{end} out of bounds for {key}")]
    InvalidRange { key: String, start: u64, end: u64 },
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Streamed object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Abstraction over object storage backends.
/// Keys are derived from owner and identifier; see [`video_key`] and [`thumbnail_key`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Upload a local file. Backends that can copy or stream should override this.
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let data = tokio::fs::read(path).await?;
        self.put(key, Bytes::from(data), content_type).await
    }

    /// Whole object, buffered in memory. Meant for small objects such as thumbnails.
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// Inclusive byte range `[start, end]`; yields exactly `end - start + 1` bytes.
    async fn get_range(&self, key: &str, start: u64, end: u64)
        -> Result<ByteStream, ObjectStoreError>;

    async fn head_size(&self, key: &str) -> Result<u64, ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Key of the processed video, `{owner}/{identifier}.mp4`
pub fn video_key(owner_id: &str, file_identifier: &str) -> String {
    format!("{owner_id}/{file_identifier}.mp4")
}

/// Key of the thumbnail, `thumbnails/{owner}/v-{identifier}.png`
pub fn thumbnail_key(owner_id: &str, file_identifier: &str) -> String {
    format!("thumbnails/{owner_id}/v-{file_identifier}.png")
}
