//! Entity model mirrored from the group-chat service.
//!
//! Entities are plain data holders. Users and resolved attachment locators
//! derive `Serialize` and `Deserialize`; messages travel over the wire
//! through the record shapes in `groupmirror_shared::protocol`.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

use groupmirror_shared::protocol::{AttachmentWire, OutgoingMessageWire};
use groupmirror_shared::{GroupId, MessageId, UserId};

use crate::error::{MirrorError, Result};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user.  Equality is structural over every field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    id: UserId,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub guid: Option<String>,
    /// Group id -> group-scoped membership id.
    pub memberships: BTreeMap<GroupId, String>,
}

impl User {
    pub fn new(id: impl Into<UserId>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            avatar_url: None,
            phone: None,
            email: None,
            guid: None,
            memberships: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// The id this user is known by inside `group`, if any.
    pub fn membership_in(&self, group: &GroupId) -> Option<&str> {
        self.memberships.get(group).map(String::as_str)
    }

    pub fn with_membership(mut self, group: impl Into<GroupId>, membership_id: impl Into<String>) -> Self {
        self.memberships.insert(group.into(), membership_id.into());
        self
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
    Picture,
    Video,
    File,
}

/// Where the attachment's content lives before (or instead of) upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    LocalPath(PathBuf),
    Bytes(Bytes),
    /// URL of a picture or video that is already hosted.  Files have no
    /// URL form; use [`Attachment::from_resolved`] with their file id.
    Remote(String),
}

/// Server-assigned location of an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedLocator {
    Picture { url: String },
    Video { url: String, preview_url: Option<String> },
    File { file_id: String },
}

impl ResolvedLocator {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            Self::Picture { .. } => AttachmentKind::Picture,
            Self::Video { .. } => AttachmentKind::Video,
            Self::File { .. } => AttachmentKind::File,
        }
    }

    pub fn to_wire(&self) -> AttachmentWire {
        match self {
            Self::Picture { url } => AttachmentWire::Image { url: url.clone() },
            Self::Video { url, preview_url } => AttachmentWire::Video {
                url: url.clone(),
                preview_url: preview_url.clone(),
            },
            Self::File { file_id } => AttachmentWire::File {
                file_id: file_id.clone(),
            },
        }
    }
}

/// A picture, video or file attached to a message.
///
/// Clones share upload state: once any clone is resolved, all of them are.
#[derive(Debug, Clone)]
pub struct Attachment {
    kind: AttachmentKind,
    content: AttachmentContent,
    file_name: Option<String>,
    resolved: Arc<OnceCell<ResolvedLocator>>,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, content: AttachmentContent) -> Self {
        Self {
            kind,
            content,
            file_name: None,
            resolved: Arc::new(OnceCell::new()),
        }
    }

    pub fn from_path(kind: AttachmentKind, path: impl Into<PathBuf>) -> Self {
        Self::new(kind, AttachmentContent::LocalPath(path.into()))
    }

    pub fn from_bytes(kind: AttachmentKind, data: impl Into<Bytes>) -> Self {
        Self::new(kind, AttachmentContent::Bytes(data.into()))
    }

    /// An attachment that already lives on the server.
    pub fn from_resolved(locator: ResolvedLocator) -> Self {
        let remote = match &locator {
            ResolvedLocator::Picture { url } | ResolvedLocator::Video { url, .. } => url.clone(),
            ResolvedLocator::File { file_id } => file_id.clone(),
        };
        Self {
            kind: locator.kind(),
            content: AttachmentContent::Remote(remote),
            file_name: None,
            resolved: Arc::new(OnceCell::new_with(Some(locator))),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    pub fn content(&self) -> &AttachmentContent {
        &self.content
    }

    /// Name reported to the file service.
    pub fn file_name(&self) -> String {
        if let Some(ref name) = self.file_name {
            return name.clone();
        }
        match &self.content {
            AttachmentContent::LocalPath(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment")
                .to_string(),
            _ => "attachment".to_string(),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.content {
            AttachmentContent::LocalPath(path) => Some(path),
            _ => None,
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedLocator> {
        self.resolved.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// The cached locator, or the one `upload` produces.
    ///
    /// Clones resolving at the same time share one `upload` call; the rest
    /// wait for it.  A failed `upload` leaves the attachment unresolved and
    /// the next waiter tries again.
    pub async fn resolve_with<E, F, Fut>(&self, upload: F) -> std::result::Result<&ResolvedLocator, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<ResolvedLocator, E>>,
    {
        self.resolved.get_or_try_init(upload).await
    }
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.content == other.content
            && self.file_name == other.file_name
            && self.resolved.get() == other.resolved.get()
    }
}

impl Eq for Attachment {}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    User,
    System,
}

/// A chat message, either drafted locally or mirrored from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// `None` until the server has assigned one.
    pub id: Option<MessageId>,
    /// Client-generated id used by the server to deduplicate sends.
    pub guid: String,
    pub sender: Arc<User>,
    pub created_at: DateTime<Utc>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub favorited_by: BTreeSet<UserId>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub kind: MessageKind,
}

impl Message {
    /// Start a new outgoing message with a fresh client guid.
    pub fn draft(sender: Arc<User>, text: impl Into<String>) -> Self {
        Self {
            id: None,
            guid: Uuid::new_v4().to_string(),
            sender,
            created_at: Utc::now(),
            text: Some(text.into()),
            attachments: Vec::new(),
            favorited_by: BTreeSet::new(),
            pinned_at: None,
            kind: MessageKind::User,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }

    /// Server id when known, client guid otherwise.
    pub fn identity_key(&self) -> &str {
        self.id
            .as_ref()
            .map(MessageId::as_str)
            .unwrap_or(&self.guid)
    }

    /// Build the send body.  Every attachment must already be resolved.
    pub fn to_outgoing(&self) -> Result<OutgoingMessageWire> {
        let attachments = self
            .attachments
            .iter()
            .enumerate()
            .map(|(index, a)| {
                a.resolved()
                    .map(ResolvedLocator::to_wire)
                    .ok_or(MirrorError::UnresolvedAttachment { index })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OutgoingMessageWire {
            source_guid: self.guid.clone(),
            text: self.text.clone(),
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_equality_is_structural() {
        let a = User::new("u1", "Ada").with_membership("g1", "m1");
        let b = User::new("u1", "Ada").with_membership("g1", "m1");
        let c = User::new("u1", "Ada").with_membership("g1", "m2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.membership_in(&GroupId::from("g1")), Some("m1"));
        assert_eq!(a.membership_in(&GroupId::from("g2")), None);
    }

    #[tokio::test]
    async fn test_attachment_resolution_is_shared_and_sticky() {
        let a = Attachment::from_bytes(AttachmentKind::Picture, vec![1u8, 2, 3]);
        let b = a.clone();
        assert!(!a.is_resolved());

        let first = ResolvedLocator::Picture {
            url: "https://i.example/1".into(),
        };
        let second = ResolvedLocator::Picture {
            url: "https://i.example/2".into(),
        };
        let got = a
            .resolve_with(|| async { Ok::<_, ()>(first.clone()) })
            .await
            .unwrap();
        assert_eq!(got, &first);
        let got = b
            .resolve_with(|| async { Ok::<_, ()>(second) })
            .await
            .unwrap();
        assert_eq!(got, &first);
        assert_eq!(b.resolved(), Some(&first));
    }

    #[test]
    fn test_file_name_from_path() {
        let a = Attachment::from_path(AttachmentKind::File, "/tmp/report.pdf");
        assert_eq!(a.file_name(), "report.pdf");
        let b = Attachment::from_bytes(AttachmentKind::File, vec![0u8]).with_file_name("x.bin");
        assert_eq!(b.file_name(), "x.bin");
    }

    #[tokio::test]
    async fn test_outgoing_requires_resolved_attachments() {
        let sender = Arc::new(User::new("u1", "Ada"));
        let pending = Attachment::from_bytes(AttachmentKind::Picture, vec![1u8]);
        let msg = Message::draft(sender, "look").with_attachment(pending.clone());

        assert_eq!(
            msg.to_outgoing().unwrap_err(),
            MirrorError::UnresolvedAttachment { index: 0 }
        );

        pending
            .resolve_with(|| async {
                Ok::<_, ()>(ResolvedLocator::Picture {
                    url: "https://i.example/p".into(),
                })
            })
            .await
            .unwrap();
        let wire = msg.to_outgoing().unwrap();
        assert_eq!(wire.source_guid, msg.guid);
        assert_eq!(
            wire.attachments,
            vec![AttachmentWire::Image {
                url: "https://i.example/p".into()
            }]
        );
    }
}
