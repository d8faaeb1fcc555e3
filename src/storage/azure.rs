//! Azure Blob Storage backend
//!
//! Authenticates with a storage account connection string. A connection
//! string of `UseDevelopmentStorage=true` targets a local Azurite emulator.

use async_trait::async_trait;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder, ContainerClient};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;

use super::{BlobNameStream, BlobStorage, ByteStream, ContainerHandle, StorageError, StorageOperation};

/// Real Azure Blob Storage implementation
pub struct AzureBlobStorage {
    service: BlobServiceClient,
}

impl AzureBlobStorage {
    pub fn new(service: BlobServiceClient) -> Self {
        Self { service }
    }

    pub fn from_connection_string(connection_string: &str) -> Result<Self, StorageError> {
        let parsed = ConnectionString::new(connection_string).map_err(|e| {
            StorageError::InvalidConnectionString {
                reason: e.to_string(),
            }
        })?;

        if parsed.use_development_storage == Some(true) {
            tracing::info!("Using local storage emulator");
            return Ok(Self::new(ClientBuilder::emulator().blob_service_client()));
        }

        let account = parsed
            .account_name
            .ok_or_else(|| StorageError::InvalidConnectionString {
                reason: "AccountName is missing".to_string(),
            })?;
        let credentials = parsed
            .storage_credentials()
            .map_err(|e| StorageError::InvalidConnectionString {
                reason: e.to_string(),
            })?;

        tracing::debug!(account = %account, "Connecting to storage account");
        Ok(Self::new(ClientBuilder::new(account, credentials).blob_service_client()))
    }

    fn container(&self, container: &ContainerHandle) -> ContainerClient {
        self.service.container_client(container.name())
    }
}

#[async_trait]
impl BlobStorage for AzureBlobStorage {
    async fn create_container(&self, name: &str) -> Result<ContainerHandle, StorageError> {
        self.service
            .container_client(name)
            .create()
            .await
            .map_err(|e| StorageError::service(StorageOperation::CreateContainer, e))?;
        Ok(ContainerHandle::new(name))
    }

    async fn upload_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
        mut content: ByteStream,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let blob = self.container(container).blob_client(blob_name);

        if !overwrite {
            let exists = blob
                .exists()
                .await
                .map_err(|e| StorageError::service(StorageOperation::UploadBlob, e))?;
            if exists {
                return Err(StorageError::BlobAlreadyExists {
                    container: container.name().to_string(),
                    blob: blob_name.to_string(),
                });
            }
        }

        // Block blob uploads take the whole body at once.
        let mut data = Vec::new();
        content.read_to_end(&mut data).await?;

        blob.put_block_blob(data)
            .await
            .map_err(|e| StorageError::service(StorageOperation::UploadBlob, e))?;
        Ok(())
    }

    async fn list_blobs(&self, container: &ContainerHandle) -> Result<BlobNameStream, StorageError> {
        let pages = self.container(container).list_blobs().into_stream();

        let names = pages
            .map_err(|e| StorageError::service(StorageOperation::ListBlobs, e))
            .map_ok(|page| {
                let names: Vec<Result<String, StorageError>> =
                    page.blobs.blobs().map(|blob| Ok(blob.name.clone())).collect();
                stream::iter(names)
            })
            .try_flatten();

        Ok(names.boxed())
    }

    async fn download_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
    ) -> Result<ByteStream, StorageError> {
        let data = self
            .container(container)
            .blob_client(blob_name)
            .get_content()
            .await
            .map_err(|e| StorageError::service(StorageOperation::DownloadBlob, e))?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }
}
