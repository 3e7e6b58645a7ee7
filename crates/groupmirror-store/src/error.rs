use groupmirror_shared::WireError;
use thiserror::Error;

/// Errors produced while folding server records into local entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// The record itself is unusable (bad timestamp, missing field).
    #[error("Malformed record: {0}")]
    Wire(#[from] WireError),

    /// A message cannot be sent while one of its attachments has no
    /// server-side locator yet.
    #[error("Attachment {index} has not been uploaded")]
    UnresolvedAttachment { index: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MirrorError>;
