use std::sync::Arc;

use aws_config::BehaviorVersion;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::ClientBuilder;
use trace_config::ObjectStoreConfig;
use trace_objectstore::{AzureBlobStore, LocalDisk, ObjectStore, S3Store};

use crate::error::CliError;

/// Builds the concrete `ObjectStore` backend named by `config`. Credentials
/// come from the ambient environment (the AWS SDK's default provider chain,
/// or `AZURE_STORAGE_ACCOUNT`/`AZURE_STORAGE_ACCESS_KEY`) rather than the
/// typed config record, since config-file loading of secrets is out of
/// scope for this exercise.
pub async fn build(config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStore>, CliError> {
    match config {
        ObjectStoreConfig::Local { root } => Ok(Arc::new(LocalDisk::new(root.clone()))),
        ObjectStoreConfig::S3 { bucket, region, prefix } => {
            let shared_config = aws_config::defaults(BehaviorVersion::latest())
                .region(aws_sdk_s3::config::Region::new(region.clone()))
                .load()
                .await;
            let client = aws_sdk_s3::Client::new(&shared_config);
            Ok(Arc::new(S3Store::new(client, bucket.clone(), prefix.clone())))
        }
        ObjectStoreConfig::Azure { container, prefix } => {
            let account = std::env::var("AZURE_STORAGE_ACCOUNT")
                .map_err(|_| CliError::Config("AZURE_STORAGE_ACCOUNT is not set".into()))?;
            let access_key = std::env::var("AZURE_STORAGE_ACCESS_KEY")
                .map_err(|_| CliError::Config("AZURE_STORAGE_ACCESS_KEY is not set".into()))?;
            let credentials = StorageCredentials::access_key(account.clone(), access_key);
            let container_client = ClientBuilder::new(account, credentials).container_client(container.clone());
            Ok(Arc::new(AzureBlobStore::new(container_client, prefix.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_writes_under_the_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = build(&ObjectStoreConfig::Local { root: dir.path().to_path_buf() }).await.unwrap();
        store.write("tenant/object", bytes::Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(store.read("tenant/object", None).await.unwrap(), bytes::Bytes::from_static(b"hi"));
    }

    #[tokio::test]
    async fn azure_backend_requires_account_env_vars() {
        std::env::remove_var("AZURE_STORAGE_ACCOUNT");
        let result = build(&ObjectStoreConfig::Azure { container: "c".into(), prefix: None }).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
