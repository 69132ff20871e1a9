use thiserror::Error;

/// Errors raised while constructing or parsing values in the core data model.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("expected {expected} bytes for {what}, got {got}")]
    BadIdLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid hex in {what}: {source}")]
    BadHex {
        what: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("attribute value type tag {0} is not recognized")]
    UnknownAttributeTag(u8),
}
