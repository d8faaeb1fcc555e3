// In-memory blob service - no network, records every call

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

use super::{BlobNameStream, BlobStorage, ByteStream, ContainerHandle, StorageError, StorageOperation};

/// A call received by [`InMemoryBlobStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    CreateContainer { name: String },
    UploadBlob { container: String, blob: String, overwrite: bool },
    ListBlobs { container: String },
    DownloadBlob { container: String, blob: String },
}

impl StorageCall {
    pub fn operation(&self) -> StorageOperation {
        match self {
            StorageCall::CreateContainer { .. } => StorageOperation::CreateContainer,
            StorageCall::UploadBlob { .. } => StorageOperation::UploadBlob,
            StorageCall::ListBlobs { .. } => StorageOperation::ListBlobs,
            StorageCall::DownloadBlob { .. } => StorageOperation::DownloadBlob,
        }
    }
}

/// Blob service kept in process memory
///
/// Backs the `--in-memory` walkthrough mode and the test suite. Selected
/// operations can be made to fail with [`InMemoryBlobStorage::fail_on`].
#[derive(Debug, Default)]
pub struct InMemoryBlobStorage {
    containers: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    calls: Mutex<Vec<StorageCall>>,
    failures: Mutex<HashSet<StorageOperation>>,
}

impl InMemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `operation` fail with a service error
    pub fn fail_on(&self, operation: StorageOperation) {
        lock(&self.failures).insert(operation);
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        lock(&self.calls).clone()
    }

    pub fn was_called(&self, operation: StorageOperation) -> bool {
        lock(&self.calls).iter().any(|c| c.operation() == operation)
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.containers).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn blob(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        lock(&self.containers)
            .get(container)
            .and_then(|blobs| blobs.get(blob))
            .cloned()
    }

    /// Seed a blob directly, bypassing the call log
    pub fn insert_blob(&self, container: &str, blob: &str, content: impl Into<Vec<u8>>) {
        lock(&self.containers)
            .entry(container.to_string())
            .or_default()
            .insert(blob.to_string(), content.into());
    }

    fn record(&self, call: StorageCall) -> Result<(), StorageError> {
        let operation = call.operation();
        lock(&self.calls).push(call);
        if lock(&self.failures).contains(&operation) {
            return Err(StorageError::service(operation, "injected failure"));
        }
        Ok(())
    }
}

// A poisoned lock only means another test thread panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn create_container(&self, name: &str) -> Result<ContainerHandle, StorageError> {
        self.record(StorageCall::CreateContainer {
            name: name.to_string(),
        })?;

        let mut containers = lock(&self.containers);
        if containers.contains_key(name) {
            return Err(StorageError::ContainerAlreadyExists {
                container: name.to_string(),
            });
        }
        containers.insert(name.to_string(), BTreeMap::new());
        Ok(ContainerHandle::new(name))
    }

    async fn upload_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
        mut content: ByteStream,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        self.record(StorageCall::UploadBlob {
            container: container.name().to_string(),
            blob: blob_name.to_string(),
            overwrite,
        })?;

        let mut data = Vec::new();
        content.read_to_end(&mut data).await?;

        let mut containers = lock(&self.containers);
        let blobs = containers
            .get_mut(container.name())
            .ok_or_else(|| StorageError::ContainerNotFound {
                container: container.name().to_string(),
            })?;
        if !overwrite && blobs.contains_key(blob_name) {
            return Err(StorageError::BlobAlreadyExists {
                container: container.name().to_string(),
                blob: blob_name.to_string(),
            });
        }
        blobs.insert(blob_name.to_string(), data);
        Ok(())
    }

    async fn list_blobs(&self, container: &ContainerHandle) -> Result<BlobNameStream, StorageError> {
        self.record(StorageCall::ListBlobs {
            container: container.name().to_string(),
        })?;

        let names: Vec<String> = lock(&self.containers)
            .get(container.name())
            .ok_or_else(|| StorageError::ContainerNotFound {
                container: container.name().to_string(),
            })?
            .keys()
            .cloned()
            .collect();

        Ok(stream::iter(names.into_iter().map(Ok)).boxed())
    }

    async fn download_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
    ) -> Result<ByteStream, StorageError> {
        self.record(StorageCall::DownloadBlob {
            container: container.name().to_string(),
            blob: blob_name.to_string(),
        })?;

        let containers = lock(&self.containers);
        let blobs = containers
            .get(container.name())
            .ok_or_else(|| StorageError::ContainerNotFound {
                container: container.name().to_string(),
            })?;
        let data = blobs
            .get(blob_name)
            .cloned()
            .ok_or_else(|| StorageError::BlobNotFound {
                container: container.name().to_string(),
                blob: blob_name.to_string(),
            })?;

        Ok(Box::new(std::io::Cursor::new(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn bytes(data: &'static [u8]) -> ByteStream {
        Box::new(std::io::Cursor::new(data))
    }

    #[tokio::test]
    async fn test_upload_list_download() {
        let storage = InMemoryBlobStorage::new();
        let container = storage.create_container("box").await.unwrap();

        storage.upload_blob(&container, "b.txt", bytes(b"two"), true).await.unwrap();
        storage.upload_blob(&container, "a.txt", bytes(b"one"), true).await.unwrap();

        let names: Vec<String> = storage
            .list_blobs(&container)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);

        let mut reader = storage.download_blob(&container, "a.txt").await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"one");
    }

    #[tokio::test]
    async fn test_duplicate_container_is_rejected() {
        let storage = InMemoryBlobStorage::new();
        storage.create_container("box").await.unwrap();

        let err = storage.create_container("box").await.unwrap_err();
        assert!(matches!(err, StorageError::ContainerAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_overwrite_flag_is_honoured() {
        let storage = InMemoryBlobStorage::new();
        let container = storage.create_container("box").await.unwrap();
        storage.upload_blob(&container, "a", bytes(b"v1"), false).await.unwrap();

        let err = storage
            .upload_blob(&container, "a", bytes(b"v2"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BlobAlreadyExists { .. }));

        storage.upload_blob(&container, "a", bytes(b"v2"), true).await.unwrap();
        assert_eq!(storage.blob("box", "a"), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let storage = InMemoryBlobStorage::new();
        storage.fail_on(StorageOperation::CreateContainer);

        let err = storage.create_container("box").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Service {
                operation: StorageOperation::CreateContainer,
                ..
            }
        ));
        assert!(storage.was_called(StorageOperation::CreateContainer));
        assert!(storage.container_names().is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let storage = InMemoryBlobStorage::new();
        let container = storage.create_container("box").await.unwrap();

        let err = storage.download_blob(&container, "ghost").await.err().unwrap();
        assert!(matches!(err, StorageError::BlobNotFound { .. }));
    }
}
