//! Folding server records into local entities.

use std::sync::Arc;

use tracing::debug;

use groupmirror_shared::protocol::{timestamp_from_unix, AttachmentWire, MemberWire, MessageWire};
use groupmirror_shared::{GroupId, MessageId, UserId};

use crate::error::Result;
use crate::members::MemberSet;
use crate::models::{Attachment, Message, MessageKind, ResolvedLocator, User};

/// Build a [`User`] from a group member record listed under `group`.
pub fn user_from_member(wire: &MemberWire, group: &GroupId) -> User {
    let mut user = User::new(wire.user_id.as_str(), wire.nickname.as_str());
    user.avatar_url = wire.image_url.clone();
    user.phone = wire.phone_number.clone();
    user.email = wire.email.clone();
    user.guid = wire.guid.clone();
    if let Some(ref membership) = wire.id {
        user.memberships.insert(group.clone(), membership.clone());
    }
    user
}

pub fn attachment_from_wire(wire: &AttachmentWire) -> Option<Attachment> {
    let locator = match wire {
        AttachmentWire::Image { url } => ResolvedLocator::Picture { url: url.clone() },
        AttachmentWire::Video { url, preview_url } => ResolvedLocator::Video {
            url: url.clone(),
            preview_url: preview_url.clone(),
        },
        AttachmentWire::File { file_id } => ResolvedLocator::File {
            file_id: file_id.clone(),
        },
        AttachmentWire::Unsupported => return None,
    };
    Some(Attachment::from_resolved(locator))
}

/// Build a [`Message`], resolving the sender against `members`.
///
/// Senders who are no longer members get a detached [`User`] built from
/// the name and avatar carried on the message; they are not added to the
/// member set.
pub fn message_from_wire(wire: MessageWire, members: &MemberSet) -> Result<Message> {
    let created_at = timestamp_from_unix(wire.created_at)?;
    let pinned_at = wire.pinned_at.map(timestamp_from_unix).transpose()?;

    let sender_id = UserId::from(wire.user_id.as_str());
    let sender = members.get(&sender_id).unwrap_or_else(|| {
        let mut detached = User::new(sender_id, wire.name.as_str());
        detached.avatar_url = wire.avatar_url.clone();
        Arc::new(detached)
    });

    let total = wire.attachments.len();
    let attachments: Vec<Attachment> = wire
        .attachments
        .iter()
        .filter_map(attachment_from_wire)
        .collect();
    if attachments.len() < total {
        debug!(
            message_id = %wire.id,
            skipped = total - attachments.len(),
            "Skipped unsupported attachment types"
        );
    }

    let kind = if wire.system || wire.sender_type.as_deref() == Some("system") {
        MessageKind::System
    } else {
        MessageKind::User
    };

    Ok(Message {
        id: Some(MessageId::from(wire.id)),
        guid: wire.source_guid,
        sender,
        created_at,
        text: wire.text,
        attachments,
        favorited_by: wire.favorited_by.into_iter().map(UserId::from).collect(),
        pinned_at,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupmirror_shared::WireError;
    use crate::error::MirrorError;

    fn wire(user_id: &str) -> MessageWire {
        MessageWire {
            id: "m1".into(),
            source_guid: "guid-1".into(),
            created_at: 1_700_000_000,
            user_id: user_id.into(),
            sender_type: Some("user".into()),
            name: "Former Member".into(),
            avatar_url: Some("https://a.example/x".into()),
            text: Some("hello".into()),
            system: false,
            favorited_by: vec!["u2".into(), "u3".into()],
            attachments: vec![
                AttachmentWire::Image {
                    url: "https://i.example/1".into(),
                },
                AttachmentWire::Unsupported,
            ],
            pinned_at: Some(1_700_000_100),
        }
    }

    #[test]
    fn test_sender_shared_with_member_set() {
        let members = MemberSet::new();
        let ada = members.upsert(User::new("u1", "Ada"));

        let msg = message_from_wire(wire("u1"), &members).unwrap();
        assert!(Arc::ptr_eq(&msg.sender, &ada));
        assert_eq!(msg.attachments.len(), 1);
        assert!(msg.attachments[0].is_resolved());
        assert_eq!(msg.favorited_by.len(), 2);
        assert!(msg.is_pinned());
        assert_eq!(msg.kind, MessageKind::User);
    }

    #[test]
    fn test_unknown_sender_is_detached() {
        let members = MemberSet::new();
        let msg = message_from_wire(wire("gone"), &members).unwrap();
        assert_eq!(msg.sender.nickname, "Former Member");
        assert!(members.is_empty());
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let mut w = wire("u1");
        w.created_at = i64::MAX;
        let err = message_from_wire(w, &MemberSet::new()).unwrap_err();
        assert_eq!(err, MirrorError::Wire(WireError::InvalidTimestamp(i64::MAX)));
    }

    #[test]
    fn test_member_record_carries_membership() {
        let group = GroupId::from("g1");
        let member = MemberWire {
            id: Some("mem-7".into()),
            user_id: "u7".into(),
            nickname: "Seven".into(),
            ..Default::default()
        };
        let user = user_from_member(&member, &group);
        assert_eq!(user.membership_in(&group), Some("mem-7"));
        assert_eq!(user.id().as_str(), "u7");
    }
}
