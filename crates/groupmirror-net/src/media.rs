//! Media duration boundary.
//!
//! Decoding containers is not this crate's job; callers plug in a
//! [`DurationProbe`].  Video longer than the configured maximum is refused
//! before any upload request is built.

use std::time::Duration;

use groupmirror_store::{AttachmentContent, AttachmentKind};

use crate::error::AttachmentError;

pub trait DurationProbe: Send + Sync {
    /// Playback length of `content`, or `None` when it cannot be told.
    fn duration(&self, content: &AttachmentContent) -> Result<Option<Duration>, AttachmentError>;
}

/// Probe that never knows; every video passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownDuration;

impl DurationProbe for UnknownDuration {
    fn duration(&self, _content: &AttachmentContent) -> Result<Option<Duration>, AttachmentError> {
        Ok(None)
    }
}

/// Probe reporting a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct KnownDuration(pub Duration);

impl DurationProbe for KnownDuration {
    fn duration(&self, _content: &AttachmentContent) -> Result<Option<Duration>, AttachmentError> {
        Ok(Some(self.0))
    }
}

/// Refuse video whose probed length exceeds `max`.  Other kinds pass.
pub fn ensure_within_limit(
    kind: AttachmentKind,
    content: &AttachmentContent,
    probe: &dyn DurationProbe,
    max: Duration,
) -> Result<(), AttachmentError> {
    if kind != AttachmentKind::Video {
        return Ok(());
    }
    match probe.duration(content)? {
        Some(actual) if actual > max => Err(AttachmentError::TooLong { actual, max }),
        _ => Ok(()),
    }
}
