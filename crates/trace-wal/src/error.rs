use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode push record: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("failed to decode push record: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to convert wire record to domain type: {0}")]
    Convert(#[from] trace_types::TypesError),

    #[error("wal is shutting down")]
    ShuttingDown,
}
