use thiserror::Error;

/// A server record that parsed as JSON but cannot become a local entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Invalid unix timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unsupported record: {0}")]
    Unsupported(String),
}
