//! Subgroups: child chats living under a group.
//!
//! A [`SubGroupChat`] is a cheap handle; clones refer to the same chat and
//! [`SubGroupChat::same_handle`] tells handles apart from value-equal
//! copies.  Its member set is the parent's, not a copy.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use groupmirror_net::{ApiRequest, SyncError};
use groupmirror_shared::protocol::{timestamp_from_unix, SubgroupUpdateWire, SubgroupWire};
use groupmirror_shared::{ChatResult, GroupId, MessageId, UserId};

use crate::capabilities::{Chat, Loadable, Queryable, Sendable, Updatable};
use crate::chat::ChatCore;
use crate::queue::Pending;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubgroupProfile {
    pub topic: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubgroupProfile {
    pub fn from_wire(wire: &SubgroupWire) -> Result<Self, SyncError> {
        Ok(Self {
            topic: wire.name.clone(),
            description: wire.description.clone(),
            image_url: wire.image_url.clone(),
            created_at: Some(timestamp_from_unix(wire.created_at)?),
            updated_at: wire.updated_at.map(timestamp_from_unix).transpose()?,
        })
    }
}

/// Value view of a subgroup, compared field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgroupSnapshot {
    pub id: GroupId,
    pub parent_id: GroupId,
    pub profile: SubgroupProfile,
}

/// Fields to change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SubgroupUpdate {
    pub topic: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
}

impl SubgroupUpdate {
    fn to_wire(&self) -> SubgroupUpdateWire {
        SubgroupUpdateWire {
            topic: self.topic.clone(),
            description: self.description.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

struct SubgroupInner {
    parent_id: GroupId,
    core: ChatCore,
    profile: RwLock<SubgroupProfile>,
}

impl SubgroupInner {
    fn set_profile(&self, profile: SubgroupProfile) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = profile;
    }
}

#[derive(Clone)]
pub struct SubGroupChat {
    inner: Arc<SubgroupInner>,
}

impl SubGroupChat {
    /// Build a child of `parent`, sharing its member set.
    pub fn new(parent: &ChatCore, id: GroupId, profile: SubgroupProfile) -> Self {
        let core = ChatCore::new(
            id,
            parent.ctx().clone(),
            parent.settings().child(),
            parent.members().clone(),
        );
        Self {
            inner: Arc::new(SubgroupInner {
                parent_id: parent.id().clone(),
                core,
                profile: RwLock::new(profile),
            }),
        }
    }

    pub fn from_wire(parent: &ChatCore, wire: &SubgroupWire) -> Result<Self, SyncError> {
        let profile = SubgroupProfile::from_wire(wire)?;
        Ok(Self::new(parent, GroupId::from(wire.id.as_str()), profile))
    }

    pub fn parent_id(&self) -> &GroupId {
        &self.inner.parent_id
    }

    pub fn profile(&self) -> SubgroupProfile {
        self.inner
            .profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_profile(&self, profile: SubgroupProfile) {
        self.inner.set_profile(profile);
    }

    pub fn snapshot(&self) -> SubgroupSnapshot {
        SubgroupSnapshot {
            id: self.id().clone(),
            parent_id: self.inner.parent_id.clone(),
            profile: self.profile(),
        }
    }

    /// Whether both handles refer to the same chat object.
    pub fn same_handle(&self, other: &SubGroupChat) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop any polling this subgroup has in flight.
    pub fn cancel_pending(&self) {
        self.inner.core.cancel_pending();
    }

    /// Cancel for good; used once the subgroup is gone.
    pub(crate) fn close(&self) {
        self.inner.core.close();
    }

    pub fn like(&self, message: MessageId, viewer: UserId) -> Pending<ChatResult> {
        self.inner
            .core
            .enqueue(move |core| async move { core.set_liked(message, viewer, true).await })
    }

    pub fn unlike(&self, message: MessageId, viewer: UserId) -> Pending<ChatResult> {
        self.inner
            .core
            .enqueue(move |core| async move { core.set_liked(message, viewer, false).await })
    }
}

impl std::fmt::Debug for SubGroupChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubGroupChat")
            .field("id", self.id())
            .field("parent_id", &self.inner.parent_id)
            .field("topic", &self.profile().topic)
            .finish()
    }
}

impl Chat for SubGroupChat {
    fn core(&self) -> &ChatCore {
        &self.inner.core
    }
}

impl Loadable for SubGroupChat {
    fn load(&self) -> Pending<ChatResult> {
        let inner = Arc::clone(&self.inner);
        self.inner.core.enqueue(move |core| async move {
            let url = core.ctx().endpoints().subgroup(&inner.parent_id, core.id());
            let response = core.ctx().send(core.ctx().authed(ApiRequest::get(url))).await?;
            if !response.is(200) {
                debug!(subgroup = %core.id(), status = response.status, "Subgroup load failed");
                return Ok(ChatResult::from_status(response.status));
            }
            let wire: SubgroupWire = response.payload("subgroup")?;
            inner.set_profile(SubgroupProfile::from_wire(&wire)?);
            info!(subgroup = %core.id(), parent = %inner.parent_id, "Subgroup loaded");
            Ok(ChatResult::Success)
        })
    }
}

impl Queryable for SubGroupChat {}

impl Sendable for SubGroupChat {}

impl Updatable for SubGroupChat {
    type Changes = SubgroupUpdate;

    fn update(&self, changes: SubgroupUpdate) -> Pending<ChatResult> {
        let inner = Arc::clone(&self.inner);
        self.inner.core.enqueue(move |core| async move {
            let url = core.ctx().endpoints().subgroup(&inner.parent_id, core.id());
            let request = ApiRequest::put(url).json(&changes.to_wire())?;
            let response = core.ctx().send(core.ctx().authed(request)).await?;
            let result = ChatResult::from_status(response.status);
            if result.is_success() {
                let wire: SubgroupWire = response.payload("subgroup update")?;
                inner.set_profile(SubgroupProfile::from_wire(&wire)?);
            }
            debug!(subgroup = %core.id(), %result, "Subgroup update");
            Ok(result)
        })
    }
}
