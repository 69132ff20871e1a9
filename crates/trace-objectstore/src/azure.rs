use std::ops::Range;

use async_trait::async_trait;
use azure_storage_blobs::prelude::ContainerClient;
use bytes::Bytes;
use futures::StreamExt;

use crate::error::ObjectStoreError;
use crate::store::ObjectStore;

/// Azure Blob-backed store, one container per deployment.
pub struct AzureBlobStore {
    container: ContainerClient,
    prefix: Option<String>,
}

impl AzureBlobStore {
    pub fn new(container: ContainerClient, prefix: Option<String>) -> Self {
        Self { container, prefix }
    }

    fn key(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{path}"),
            None => path.to_string(),
        }
    }

    fn backend_err(&self, path: &str, message: impl std::fmt::Display) -> ObjectStoreError {
        ObjectStoreError::Backend {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn read(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes, ObjectStoreError> {
        let blob = self.container.blob_client(self.key(path));
        let mut builder = blob.get();
        if let Some(range) = &range {
            builder = builder.range(range.start..range.end);
        }

        let mut stream = builder.into_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if matches!(e.kind(), azure_core::error::ErrorKind::HttpResponse { status, .. } if status.as_u16() == 404) {
                    ObjectStoreError::NotFound { path: path.to_string() }
                } else {
                    self.backend_err(path, e)
                }
            })?;
            let data = chunk.data.collect().await.map_err(|e| self.backend_err(path, e))?;
            buf.extend_from_slice(&data);
        }
        Ok(Bytes::from(buf))
    }

    async fn write(&self, path: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let blob = self.container.blob_client(self.key(path));
        blob.put_block_blob(bytes).await.map_err(|e| self.backend_err(path, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let full_prefix = self.key(prefix);
        let mut out = Vec::new();
        let mut stream = self.container.list_blobs().prefix(full_prefix.clone()).into_stream();
        while let Some(page) = stream.next().await {
            let page = page.map_err(|e| self.backend_err(prefix, e))?;
            for blob in page.blobs.blobs() {
                let stripped = match &self.prefix {
                    Some(p) => blob.name.strip_prefix(&format!("{p}/")).unwrap_or(&blob.name).to_string(),
                    None => blob.name.clone(),
                };
                out.push(stripped);
            }
        }
        Ok(out)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        let blob = self.container.blob_client(self.key(path));
        match blob.delete().await {
            Ok(_) => Ok(()),
            Err(e)
                if matches!(e.kind(), azure_core::error::ErrorKind::HttpResponse { status, .. } if status.as_u16() == 404) =>
            {
                Ok(())
            }
            Err(e) => Err(self.backend_err(path, e)),
        }
    }
}
