use thiserror::Error;

/// Storage-layer failures, corresponding to spec.md §7's `STORAGE_UNAVAILABLE`
/// availability kind unless otherwise noted.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend error at {path}: {message}")]
    Backend { path: String, message: String },
}
