use thiserror::Error;

/// Rejection kinds for `Push`, per spec.md §4.1. These are admission
/// errors — retryable by the caller, never the engine's fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RejectKind {
    #[error("rate limited")]
    RateLimited,
    #[error("trace too large")]
    TraceTooLarge,
    #[error("live traces exceeded")]
    LiveTracesExceeded,
    #[error("tenant unknown")]
    TenantUnknown,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("push rejected: {0}")]
    Rejected(#[from] RejectKind),

    #[error("wal append failed: {0}")]
    Wal(#[from] trace_wal::WalError),
}
