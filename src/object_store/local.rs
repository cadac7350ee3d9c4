use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{ByteStream, ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    async fn ensure_parent(&self, path: &Path) -> Result<(), ObjectStoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<tokio::fs::File, ObjectStoreError> {
        match tokio::fs::File::open(self.object_path(key)).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        self.ensure_parent(&path).await?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        key: &str,
        source: &Path,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);
        self.ensure_parent(&path).await?;
        tokio::fs::copy(source, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let mut file = self.open(key).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        Ok(Bytes::from(data))
    }

    async fn get_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, ObjectStoreError> {
        let mut file = self.open(key).await?;
        let size = file.metadata().await?.len();
        if start > end || end >= size {
            return Err(ObjectStoreError::InvalidRange {
                key: key.to_string(),
                start,
                end,
            });
        }

        file.seek(SeekFrom::Start(start)).await?;
        let limited = file.take(end - start + 1);
        Ok(Box::pin(ReaderStream::new(limited)))
    }

    async fn head_size(&self, key: &str) -> Result<u64, ObjectStoreError> {
        let file = self.open(key).await?;
        Ok(file.metadata().await?.len())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }
}
