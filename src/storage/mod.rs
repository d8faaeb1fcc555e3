//! Blob storage abstractions
//!
//! Provides the trait the walkthrough drives, enabling the workflow to run
//! against Azure Blob Storage or an in-memory fake through dependency
//! injection.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use thiserror::Error;
use tokio::io::AsyncRead;

#[cfg(feature = "azure")]
pub mod azure;
pub mod memory;

#[cfg(feature = "azure")]
pub use azure::AzureBlobStorage;
pub use memory::{InMemoryBlobStorage, StorageCall};

/// Readable byte content handed to or returned from the service
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Lazy, single-pass sequence of blob names in a container
pub type BlobNameStream = BoxStream<'static, Result<String, StorageError>>;

/// A container that exists in the storage account
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    name: String,
}

impl ContainerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    CreateContainer,
    UploadBlob,
    ListBlobs,
    DownloadBlob,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageOperation::CreateContainer => "create container",
            StorageOperation::UploadBlob => "upload blob",
            StorageOperation::ListBlobs => "list blobs",
            StorageOperation::DownloadBlob => "download blob",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Container already exists: {container}")]
    ContainerAlreadyExists { container: String },
    #[error("Container not found: {container}")]
    ContainerNotFound { container: String },
    #[error("Blob {blob} already exists in container {container}")]
    BlobAlreadyExists { container: String, blob: String },
    #[error("Blob {blob} not found in container {container}")]
    BlobNotFound { container: String, blob: String },
    #[error("Invalid connection string: {reason}")]
    InvalidConnectionString { reason: String },
    #[error("IO error while streaming blob content: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage service failed to {operation}: {source}")]
    Service {
        operation: StorageOperation,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    pub fn service(
        operation: StorageOperation,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StorageError::Service {
            operation,
            source: source.into(),
        }
    }
}

/// Trait for blob storage operations
///
/// Each call completes before the workflow issues the next one. Failures are
/// surfaced as-is; implementations do not retry.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Create a new container
    async fn create_container(&self, name: &str) -> Result<ContainerHandle, StorageError>;

    /// Upload `content` as `blob_name`, replacing an existing blob only when `overwrite` is set
    async fn upload_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> Result<(), StorageError>;

    /// List the names of every blob in the container
    async fn list_blobs(&self, container: &ContainerHandle) -> Result<BlobNameStream, StorageError>;

    /// Open a blob's content for reading
    async fn download_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
    ) -> Result<ByteStream, StorageError>;
}
