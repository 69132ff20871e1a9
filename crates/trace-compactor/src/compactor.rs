use std::sync::Arc;

use tokio::sync::Semaphore;
use trace_block::{seal, BlockHandle, PartialIterator};
use trace_config::{BlockConfig, CompactorConfig};
use trace_objectstore::ObjectStore;
use trace_types::BlockMeta;

use crate::error::CompactorError;
use crate::merge::merge_sorted_traces;
use crate::selection::select_group;

/// Runs compaction passes for one tenant's block population (spec.md §4.4).
/// Bounded by `config.max_concurrent_jobs` so "new selections wait when the
/// worker pool is saturated" without needing an external scheduler; "errors
/// on a single group do not block unrelated groups" falls out naturally
/// since each `compact_once` call is independent and fallible on its own.
pub struct Compactor {
    store: Arc<dyn ObjectStore>,
    config: CompactorConfig,
    block_config: BlockConfig,
    permits: Arc<Semaphore>,
}

impl Compactor {
    pub fn new(store: Arc<dyn ObjectStore>, config: CompactorConfig, block_config: BlockConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self { store, config, block_config, permits }
    }

    pub async fn list_block_metas(&self, tenant_id: &str) -> Result<Vec<BlockMeta>, CompactorError> {
        let paths = self.store.list(tenant_id).await?;
        let mut metas = Vec::new();
        for path in paths {
            if path.ends_with("meta.json") {
                let bytes = self.store.read(&path, None).await?;
                metas.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(metas)
    }

    /// One compaction pass: selects a group, k-way merges it, seals the
    /// merged output, and marks every input compacted. Returns `None` when
    /// nothing in `tenant_id` is currently eligible.
    pub async fn compact_once(&self, tenant_id: &str) -> Result<Option<BlockMeta>, CompactorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("semaphore is never closed while the compactor is alive");

        let metas = self.list_block_metas(tenant_id).await?;
        let Some(group) = select_group(&metas, &self.config) else {
            return Ok(None);
        };

        let mut inputs = Vec::with_capacity(group.len());
        for meta in &group {
            let handle = BlockHandle::open(self.store.as_ref(), tenant_id, meta.clone()).await?;
            let row_groups = 0..handle.row_group_count();
            let iter = PartialIterator::open(self.store.as_ref(), tenant_id, meta, row_groups).await?;
            inputs.push(iter.read_all()?);
        }

        let merged = merge_sorted_traces(inputs);
        if merged.is_empty() {
            tracing::warn!(tenant_id, "selected group produced no traces; skipping");
            return Ok(None);
        }

        let output_meta = seal(tenant_id, merged, &self.block_config, self.store.as_ref()).await?;
        tracing::info!(
            tenant_id,
            output_block = %output_meta.block_id,
            inputs = group.len(),
            "compacted group"
        );

        for input in &group {
            self.mark_compacted(tenant_id, input, &output_meta).await?;
        }

        Ok(Some(output_meta))
    }

    async fn mark_compacted(&self, tenant_id: &str, input: &BlockMeta, output: &BlockMeta) -> Result<(), CompactorError> {
        let mut updated = input.clone();
        updated.compacted_by = Some(output.block_id);
        updated.compacted_at_unix_nano = Some(now_unix_nano());
        let bytes = serde_json::to_vec(&updated)?;
        self.store
            .write(&format!("{tenant_id}/{}/meta.json", input.block_id), bytes.into())
            .await?;
        Ok(())
    }

    /// Deletes inputs whose grace period has elapsed: "after a grace period
    /// equal to the maximum in-flight query duration, delete inputs"
    /// (spec.md §4.4 step 4). `now_unix_nano` is caller-supplied so tests can
    /// drive it deterministically.
    pub async fn sweep_expired(
        &self,
        tenant_id: &str,
        now_unix_nano: u64,
        max_query_deadline_secs: u64,
    ) -> Result<usize, CompactorError> {
        let grace_nanos = max_query_deadline_secs
            .saturating_mul(self.config.grace_period_deadline_multiple)
            .saturating_mul(1_000_000_000);

        let metas = self.list_block_metas(tenant_id).await?;
        let mut deleted = 0;
        for meta in metas {
            let Some(compacted_at) = meta.compacted_at_unix_nano else { continue };
            if now_unix_nano.saturating_sub(compacted_at) >= grace_nanos {
                self.delete_block(tenant_id, &meta).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_block(&self, tenant_id: &str, meta: &BlockMeta) -> Result<(), CompactorError> {
        let prefix = format!("{tenant_id}/{}", meta.block_id);
        for suffix in ["data.parquet", "bloom", "index", "meta.json"] {
            self.store.delete(&format!("{prefix}/{suffix}")).await?;
        }
        Ok(())
    }
}

fn now_unix_nano() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
