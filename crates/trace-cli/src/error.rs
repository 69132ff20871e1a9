use thiserror::Error;

/// Process exit codes (spec.md §6): `0` ok, `1` generic error, `2`
/// configuration error, `3` data integrity error.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error(transparent)]
    Generic(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::DataIntegrity(_) => 3,
            CliError::Generic(_) => 1,
        }
    }
}

impl From<trace_config::ConfigError> for CliError {
    fn from(source: trace_config::ConfigError) -> Self {
        CliError::Config(source.to_string())
    }
}

impl From<trace_wal::WalError> for CliError {
    fn from(source: trace_wal::WalError) -> Self {
        CliError::DataIntegrity(source.to_string())
    }
}

impl From<trace_objectstore::ObjectStoreError> for CliError {
    fn from(source: trace_objectstore::ObjectStoreError) -> Self {
        CliError::Generic(source.into())
    }
}
