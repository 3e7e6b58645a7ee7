use std::path::PathBuf;
use std::time::Duration;

use groupmirror_shared::WireError;
use groupmirror_store::MirrorError;
use thiserror::Error;

/// Failure to complete an HTTP exchange at all.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// An attachment that cannot be uploaded; raised before any request is made.
#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Media too long: {actual:?} (max {max:?})")]
    TooLong { actual: Duration, max: Duration },

    #[error("Cannot read attachment '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duration probe failed: {0}")]
    ProbeFailed(String),

    #[error("Remote file '{0}' has no file id; upload it or attach it by id")]
    RemoteFile(String),
}

/// Faults surfaced to the caller of a chat operation.
///
/// Expected business outcomes are `ChatResult` values, never errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response ({context}): {source}")]
    MalformedResponse {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Response to {0} carried no payload")]
    EmptyResponse(&'static str),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Attachment rejected: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Chat worker stopped before completing the operation")]
    WorkerGone,
}

impl From<WireError> for SyncError {
    fn from(e: WireError) -> Self {
        SyncError::Mirror(MirrorError::Wire(e))
    }
}
