use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompactorError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] trace_objectstore::ObjectStoreError),

    #[error("block error: {0}")]
    Block(#[from] trace_block::BlockError),

    #[error("meta serialization error: {0}")]
    Meta(#[from] serde_json::Error),
}
