use std::ops::Range;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::ObjectStoreError;
use crate::store::ObjectStore;

/// Disk-backed store for tests and single-binary deployments. Object paths
/// are joined onto `root` verbatim, so `tenant/blockId/data.parquet` becomes
/// `root/tenant/blockId/data.parquet`.
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn io_err(path: &str, source: std::io::Error) -> ObjectStoreError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ObjectStoreError::NotFound { path: path.to_string() }
    } else {
        ObjectStoreError::Io {
            path: path.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ObjectStore for LocalDisk {
    async fn read(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes, ObjectStoreError> {
        let full = self.resolve(path);
        let mut file = tokio::fs::File::open(&full).await.map_err(|e| io_err(path, e))?;

        let buf = match range {
            Some(range) => {
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| io_err(path, e))?;
                let len = (range.end - range.start) as usize;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).await.map_err(|e| io_err(path, e))?;
                buf
            }
            None => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await.map_err(|e| io_err(path, e))?;
                buf
            }
        };
        Ok(Bytes::from(buf))
    }

    async fn write(&self, path: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_err(path, e))?;
        }
        let mut file = tokio::fs::File::create(&full).await.map_err(|e| io_err(path, e))?;
        file.write_all(&bytes).await.map_err(|e| io_err(path, e))?;
        file.sync_all().await.map_err(|e| io_err(path, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let base = self.resolve(prefix);
        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(prefix, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(prefix, e))? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    out.push(rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        let full = self.resolve(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }
}
