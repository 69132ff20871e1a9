use thiserror::Error;

/// Query-path failures, tagged with the spec.md §7 error kind they map to.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Admission kind: the per-tenant job queue is already at capacity.
    #[error("job queue full for tenant {tenant_id}")]
    TooManyRequests { tenant_id: String },

    /// Input kind: a malformed `q=` predicate expression.
    #[error("invalid query predicate: {0}")]
    BadPredicate(String),

    /// Input kind: a malformed trace id, time range, or limit.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Availability kind: enough block reads failed that the result for a
    /// single, specific trace id can no longer be bounded.
    #[error("too many block reads failed to answer this request")]
    Unavailable,

    #[error(transparent)]
    ObjectStore(#[from] trace_objectstore::ObjectStoreError),

    #[error(transparent)]
    Block(#[from] trace_block::BlockError),

    #[error(transparent)]
    Meta(#[from] serde_json::Error),
}
