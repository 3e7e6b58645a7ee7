//! JSON record shapes exchanged with the group-chat service.
//!
//! These mirror the server's wire format only; turning them into local
//! entities happens in `groupmirror-store`.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Convert the service's unix-seconds timestamps.
pub fn timestamp_from_unix(secs: i64) -> Result<DateTime<Utc>, WireError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(WireError::InvalidTimestamp(secs))
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Every API response wraps its payload in `{"response": .., "meta": ..}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: Option<T>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// A member record as listed inside a group.
///
/// `id` is the group-scoped membership id, `user_id` the global one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWire {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
}

/// One entry of a bulk member-add submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMemberWire {
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub guid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMembersRequest {
    pub members: Vec<NewMemberWire>,
}

/// Accepted member-add job.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMembersAccepted {
    #[serde(alias = "result_id")]
    pub results_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberResults {
    #[serde(default)]
    pub members: Vec<MemberWire>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttachmentWire {
    Image {
        url: String,
    },
    Video {
        url: String,
        #[serde(default)]
        preview_url: Option<String>,
    },
    File {
        file_id: String,
    },
    /// Locations, mentions, emoji and anything newer.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWire {
    pub id: String,
    #[serde(default)]
    pub source_guid: String,
    pub created_at: i64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub favorited_by: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentWire>,
    #[serde(default)]
    pub pinned_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesPage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub messages: Vec<MessageWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message: MessageWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessageWire {
    pub source_guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<AttachmentWire>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessageRequest {
    pub message: OutgoingMessageWire,
}

// ---------------------------------------------------------------------------
// Groups and subgroups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GroupWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub creator_user_id: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub members: Vec<MemberWire>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default, rename = "type")]
    pub visibility: Option<String>,
    #[serde(default)]
    pub office_mode: bool,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub show_join_question: bool,
}

/// Body of `POST /groups/{id}/update`; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupUpdateWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_join_question: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubgroupWire {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, alias = "topic")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgroupCreateWire {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubgroupUpdateWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct OwnerChange {
    pub group_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeOwnerRequest {
    pub requests: Vec<OwnerChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerChangeResult {
    pub group_id: String,
    pub owner_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeOwnerResults {
    #[serde(default)]
    pub results: Vec<OwnerChangeResult>,
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PicturePayload {
    pub picture_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PictureUploaded {
    pub payload: PicturePayload,
}

/// Accepted file or video job.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusLocation {
    pub status_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileJobStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoJobStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}
