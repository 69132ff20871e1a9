use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::error::ObjectStoreError;

/// The one capability set every backend implements (spec.md §9: "Multiple
/// backends ... behind one capability set").
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads `path`, optionally restricted to a byte range (used by
    /// `PartialIterator` to fetch only the row-groups it needs).
    async fn read(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes, ObjectStoreError>;

    async fn write(&self, path: &str, bytes: Bytes) -> Result<(), ObjectStoreError>;

    /// Lists every object whose path starts with `prefix`. Callers scan with
    /// a `tenant/` prefix to enumerate blocks (spec.md §6).
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError>;
}

/// Issues a second identical read if the first hasn't returned within
/// `hedge_after`, taking whichever completes first and cancelling the other
/// (spec.md §9: "Hedged requests ... implementors must cancel the loser").
pub async fn hedged_read(
    store: &(dyn ObjectStore),
    path: &str,
    range: Option<Range<u64>>,
    hedge_after: Duration,
) -> Result<Bytes, ObjectStoreError> {
    let primary = store.read(path, range.clone());
    tokio::pin!(primary);

    match tokio::time::timeout(hedge_after, &mut primary).await {
        Ok(result) => result,
        Err(_) => {
            let hedge = store.read(path, range);
            tokio::select! {
                result = &mut primary => result,
                result = hedge => {
                    warn!(path, "hedge request won; cancelling primary");
                    result
                }
            }
        }
    }
}
