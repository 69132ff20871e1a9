use thiserror::Error;

/// Block-level failures. `BadBlock` corresponds to spec.md §7's integrity
/// kind `BAD_BLOCK` (footer or CRC mismatch).
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("object store error: {0}")]
    ObjectStore(#[from] trace_objectstore::ObjectStoreError),

    #[error("meta serialization error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("bad block {block_id}: {reason}")]
    BadBlock { block_id: String, reason: String },
}
