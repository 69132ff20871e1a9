use std::ops::Range;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::ObjectStoreError;
use crate::store::ObjectStore;

/// S3-backed store. `prefix` is an optional key prefix applied ahead of
/// every object path (e.g. a deployment-specific namespace within a shared
/// bucket), mirroring the teacher's own blob-store key layout.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
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
impl ObjectStore for S3Store {
    async fn read(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes, ObjectStoreError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(self.key(path));
        if let Some(range) = &range {
            request = request.range(format!("bytes={}-{}", range.start, range.end.saturating_sub(1)));
        }

        let output = request.send().await.map_err(|e| {
            if e.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                ObjectStoreError::NotFound { path: path.to_string() }
            } else {
                self.backend_err(path, e)
            }
        })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| self.backend_err(path, e))?
            .into_bytes();
        Ok(bytes)
    }

    async fn write(&self, path: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| self.backend_err(path, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let full_prefix = self.key(prefix);
        let mut out = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(&full_prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(|e| self.backend_err(prefix, e))?;
            for object in output.contents() {
                if let Some(key) = object.key() {
                    let stripped = match &self.prefix {
                        Some(p) => key.strip_prefix(&format!("{p}/")).unwrap_or(key).to_string(),
                        None => key.to_string(),
                    };
                    out.push(stripped);
                }
            }
            if output.is_truncated().unwrap_or(false) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }
        Ok(out)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| self.backend_err(path, e))?;
        Ok(())
    }
}
