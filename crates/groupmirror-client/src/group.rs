//! Top-level group chats.
//!
//! A [`GroupChat`] owns its subgroup list exclusively and shares its member
//! set with every subgroup in it.  All operations go through the group's
//! serial queue; accessors read the latest mirrored state without queueing.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use groupmirror_net::{run_lro, ApiContext, ApiRequest, MemberAdd, NewMember, SyncError};
use groupmirror_shared::protocol::{
    timestamp_from_unix, ChangeOwnerRequest, ChangeOwnerResults, GroupUpdateWire, GroupWire,
    OwnerChange, SubgroupCreateWire, SubgroupWire,
};
use groupmirror_shared::{ChatResult, GroupId, MessageId, UserId};
use groupmirror_store::mirror::user_from_member;
use groupmirror_store::{MemberSet, User};

use crate::capabilities::{Chat, Loadable, Queryable, Sendable, Updatable};
use crate::chat::{ChatCore, ChatSettings};
use crate::queue::Pending;
use crate::subgroup::{SubGroupChat, SubgroupProfile, SubgroupSnapshot};

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupProfile {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Visibility, permission and joinability settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSettings {
    pub visibility: Option<String>,
    pub office_mode: bool,
    pub requires_approval: bool,
    pub show_join_question: bool,
}

/// Fields to change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub share: Option<bool>,
    pub visibility: Option<String>,
    pub office_mode: Option<bool>,
    pub requires_approval: Option<bool>,
    pub show_join_question: Option<bool>,
}

impl GroupUpdate {
    fn to_wire(&self) -> GroupUpdateWire {
        GroupUpdateWire {
            name: self.name.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            share: self.share,
            office_mode: self.office_mode,
            requires_approval: self.requires_approval,
            show_join_question: self.show_join_question,
            visibility: self.visibility.clone(),
        }
    }
}

/// Ways to name the subgroup to destroy.  All three resolve to the same
/// element of the owned list.
#[derive(Debug, Clone)]
pub enum SubGroupSelector {
    Id(GroupId),
    Value(SubgroupSnapshot),
    Handle(SubGroupChat),
}

impl SubGroupSelector {
    fn matches(&self, candidate: &SubGroupChat) -> bool {
        match self {
            SubGroupSelector::Id(id) => candidate.id() == id,
            SubGroupSelector::Value(snapshot) => &candidate.snapshot() == snapshot,
            SubGroupSelector::Handle(handle) => candidate.same_handle(handle),
        }
    }
}

impl From<GroupId> for SubGroupSelector {
    fn from(id: GroupId) -> Self {
        SubGroupSelector::Id(id)
    }
}

impl From<SubgroupSnapshot> for SubGroupSelector {
    fn from(snapshot: SubgroupSnapshot) -> Self {
        SubGroupSelector::Value(snapshot)
    }
}

impl From<&SubGroupChat> for SubGroupSelector {
    fn from(handle: &SubGroupChat) -> Self {
        SubGroupSelector::Handle(handle.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Removed from position `index`; `remaining` lists the subgroups left,
    /// in order.
    Removed {
        index: usize,
        remaining: Vec<GroupId>,
    },
    Rejected(ChatResult),
}

impl DestroyOutcome {
    pub fn result(&self) -> ChatResult {
        match self {
            DestroyOutcome::Removed { .. } => ChatResult::Success,
            DestroyOutcome::Rejected(result) => *result,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(SubGroupChat),
    Rejected(ChatResult),
}

impl CreateOutcome {
    pub fn result(&self) -> ChatResult {
        match self {
            CreateOutcome::Created(_) => ChatResult::Success,
            CreateOutcome::Rejected(result) => *result,
        }
    }

    pub fn subgroup(self) -> Option<SubGroupChat> {
        match self {
            CreateOutcome::Created(sub) => Some(sub),
            CreateOutcome::Rejected(_) => None,
        }
    }
}

#[derive(Default)]
struct GroupState {
    profile: GroupProfile,
    settings: GroupSettings,
    creator_id: Option<UserId>,
    share_url: Option<String>,
    subgroups: Vec<SubGroupChat>,
}

#[derive(Clone, Default)]
struct SharedState(Arc<RwLock<GroupState>>);

impl SharedState {
    fn read(&self) -> RwLockReadGuard<'_, GroupState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GroupState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold a server group record into local state, members included.
    fn apply(&self, core: &ChatCore, wire: &GroupWire) -> Result<(), SyncError> {
        let profile = GroupProfile {
            name: wire.name.clone(),
            description: wire.description.clone(),
            image_url: wire.image_url.clone(),
            created_at: Some(timestamp_from_unix(wire.created_at)?),
            updated_at: wire.updated_at.map(timestamp_from_unix).transpose()?,
        };
        let settings = GroupSettings {
            visibility: wire.visibility.clone(),
            office_mode: wire.office_mode,
            requires_approval: wire.requires_approval,
            show_join_question: wire.show_join_question,
        };

        if !wire.members.is_empty() {
            core.members()
                .replace_all(wire.members.iter().map(|m| user_from_member(m, core.id())));
        }

        let mut state = self.write();
        state.profile = profile;
        state.settings = settings;
        state.creator_id = wire.creator_user_id.as_deref().map(UserId::from);
        state.share_url = wire.share_url.clone();
        Ok(())
    }

    /// Rebuild the subgroup list from a server listing, keeping existing
    /// handles for subgroups that are still there.
    fn reconcile_subgroups(&self, core: &ChatCore, listed: &[SubgroupWire]) -> Result<(), SyncError> {
        let existing: Vec<SubGroupChat> = self.read().subgroups.clone();
        let mut next = Vec::with_capacity(listed.len());
        for wire in listed {
            let id = GroupId::from(wire.id.as_str());
            match existing.iter().find(|s| s.id() == &id) {
                Some(kept) => {
                    kept.set_profile(SubgroupProfile::from_wire(wire)?);
                    next.push(kept.clone());
                }
                None => next.push(SubGroupChat::from_wire(core, wire)?),
            }
        }
        for dropped in existing.iter().filter(|s| !next.iter().any(|n| n.same_handle(s))) {
            dropped.close();
        }
        debug!(group_id = %core.id(), count = next.len(), "Subgroup list rebuilt");
        self.write().subgroups = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GroupChat
// ---------------------------------------------------------------------------

pub struct GroupChat {
    core: ChatCore,
    state: SharedState,
}

impl GroupChat {
    /// An empty group to be filled by [`Loadable::load`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(id: impl Into<GroupId>, ctx: ApiContext, settings: ChatSettings) -> Self {
        Self {
            core: ChatCore::new(id.into(), ctx, settings, MemberSet::new()),
            state: SharedState::default(),
        }
    }

    /// Build a group from a record already in hand, without any request.
    pub fn from_wire(wire: &GroupWire, ctx: ApiContext, settings: ChatSettings) -> Result<Self, SyncError> {
        let group = Self::new(wire.id.as_str(), ctx, settings);
        group.state.apply(&group.core, wire)?;
        Ok(group)
    }

    pub fn profile(&self) -> GroupProfile {
        self.state.read().profile.clone()
    }

    pub fn group_settings(&self) -> GroupSettings {
        self.state.read().settings.clone()
    }

    pub fn share_url(&self) -> Option<String> {
        self.state.read().share_url.clone()
    }

    pub fn creator_id(&self) -> Option<UserId> {
        self.state.read().creator_id.clone()
    }

    /// The creator, if currently a member.  Lookup only; the member set
    /// owns the user.
    pub fn creator(&self) -> Option<Arc<User>> {
        let id = self.creator_id()?;
        self.core.members().get(&id)
    }

    pub fn subgroups(&self) -> Vec<SubGroupChat> {
        self.state.read().subgroups.clone()
    }

    pub fn subgroup(&self, id: &GroupId) -> Option<SubGroupChat> {
        self.state.read().subgroups.iter().find(|s| s.id() == id).cloned()
    }

    /// Stop polling in flight here and in every subgroup.  Later
    /// operations are unaffected.
    pub fn cancel_pending(&self) {
        self.core.cancel_pending();
        for sub in self.subgroups() {
            sub.cancel_pending();
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add people to the group and mirror them once the server has
    /// processed the request.
    pub fn add_members(&self, members: Vec<NewMember>) -> Pending<ChatResult> {
        self.core.enqueue(move |core| async move {
            if members.is_empty() {
                return Ok(ChatResult::MissingData);
            }
            let op = MemberAdd::new(core.id().clone(), members);
            let cancel = core.poll_token();
            let outcome = run_lro(core.ctx(), &op, core.settings().member_poll, &cancel).await?;
            let result = outcome.result();
            if let Some(added) = outcome.completed() {
                for wire in &added {
                    core.members().upsert(user_from_member(wire, core.id()));
                }
                info!(group_id = %core.id(), added = added.len(), "Members added");
            } else {
                warn!(group_id = %core.id(), %result, "Member add did not complete");
            }
            Ok(result)
        })
    }

    /// Remove `user` from the group.  A user with no membership id in this
    /// group is `NotFound` and nothing is sent.
    pub fn remove_member(&self, user: UserId) -> Pending<ChatResult> {
        self.core.enqueue(move |core| async move {
            let Some(membership) = core.members().membership_id(&user, core.id()) else {
                debug!(group_id = %core.id(), user_id = %user, "No membership to remove");
                return Ok(ChatResult::NotFound);
            };
            let url = core.ctx().endpoints().member_remove(core.id(), &membership);
            let response = core.ctx().send(core.ctx().authed(ApiRequest::post(url))).await?;
            let result = ChatResult::from_status(response.status);
            if result.is_success() {
                core.members().remove(&user);
                info!(group_id = %core.id(), user_id = %user, "Member removed");
            }
            Ok(result)
        })
    }

    /// Hand ownership to `new_owner`.
    pub fn change_owner(&self, new_owner: UserId) -> Pending<ChatResult> {
        let state = self.state.clone();
        self.core.enqueue(move |core| async move {
            let body = ChangeOwnerRequest {
                requests: vec![OwnerChange {
                    group_id: core.id().to_string(),
                    owner_id: new_owner.to_string(),
                }],
            };
            let request = ApiRequest::post(core.ctx().endpoints().change_owners()).json(&body)?;
            let response = core.ctx().send(core.ctx().authed(request)).await?;
            if !response.is(200) {
                return Ok(ChatResult::from_status(response.status));
            }

            let results: ChangeOwnerResults = response.payload("change owner")?;
            let result = results
                .results
                .iter()
                .find(|r| r.group_id == core.id().as_str())
                .map_or(ChatResult::Failure, |r| {
                    ChatResult::from_owner_change_status(&r.status)
                });
            if result.is_success() {
                state.write().creator_id = Some(new_owner.clone());
            }
            info!(group_id = %core.id(), owner = %new_owner, %result, "Ownership change");
            Ok(result)
        })
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn like(&self, message: MessageId, viewer: UserId) -> Pending<ChatResult> {
        self.core
            .enqueue(move |core| async move { core.set_liked(message, viewer, true).await })
    }

    pub fn unlike(&self, message: MessageId, viewer: UserId) -> Pending<ChatResult> {
        self.core
            .enqueue(move |core| async move { core.set_liked(message, viewer, false).await })
    }

    // -----------------------------------------------------------------------
    // Subgroup lifecycle
    // -----------------------------------------------------------------------

    /// Create a subgroup sharing this group's member set and append it to
    /// the owned list.
    pub fn create_subgroup(
        &self,
        topic: impl Into<String>,
        description: Option<String>,
    ) -> Pending<CreateOutcome> {
        let state = self.state.clone();
        let body = SubgroupCreateWire {
            topic: topic.into(),
            description,
        };
        self.core.enqueue(move |core| async move {
            let request = ApiRequest::post(core.ctx().endpoints().subgroups(core.id())).json(&body)?;
            let response = core.ctx().send(core.ctx().authed(request)).await?;
            let result = ChatResult::from_status(response.status);
            if !result.is_success() {
                warn!(group_id = %core.id(), status = response.status, "Subgroup creation rejected");
                return Ok(CreateOutcome::Rejected(result));
            }

            let wire: SubgroupWire = response.payload("subgroup")?;
            let sub = SubGroupChat::from_wire(&core, &wire)?;
            state.write().subgroups.push(sub.clone());
            info!(group_id = %core.id(), subgroup = %sub.id(), topic = %body.topic, "Subgroup created");
            Ok(CreateOutcome::Created(sub))
        })
    }

    /// Delete the subgroup named by `selector` and drop it from the owned
    /// list.  Nothing is sent when no subgroup matches.
    pub fn destroy_subgroup(&self, selector: impl Into<SubGroupSelector>) -> Pending<DestroyOutcome> {
        let state = self.state.clone();
        let selector = selector.into();
        self.core.enqueue(move |core| async move {
            let target = state
                .read()
                .subgroups
                .iter()
                .find(|s| selector.matches(s))
                .map(|s| s.id().clone());
            let Some(target) = target else {
                debug!(group_id = %core.id(), ?selector, "No matching subgroup");
                return Ok(DestroyOutcome::Rejected(ChatResult::NotFound));
            };

            let url = core.ctx().endpoints().subgroup(core.id(), &target);
            let response = core.ctx().send(core.ctx().authed(ApiRequest::delete(url))).await?;
            let result = ChatResult::from_status(response.status);
            if !result.is_success() {
                warn!(group_id = %core.id(), subgroup = %target, %result, "Subgroup deletion rejected");
                return Ok(DestroyOutcome::Rejected(result));
            }

            let mut state = state.write();
            let Some(index) = state.subgroups.iter().position(|s| s.id() == &target) else {
                return Ok(DestroyOutcome::Rejected(ChatResult::NotFound));
            };
            let removed = state.subgroups.remove(index);
            removed.close();
            let remaining = state.subgroups.iter().map(|s| s.id().clone()).collect();
            info!(group_id = %core.id(), subgroup = %target, index, "Subgroup destroyed");
            Ok(DestroyOutcome::Removed { index, remaining })
        })
    }
}

impl std::fmt::Debug for GroupChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("GroupChat")
            .field("id", self.core.id())
            .field("name", &state.profile.name)
            .field("subgroups", &state.subgroups.len())
            .field("members", &self.core.members().len())
            .finish()
    }
}

impl Chat for GroupChat {
    fn core(&self) -> &ChatCore {
        &self.core
    }
}

impl Loadable for GroupChat {
    /// Fetch the group record, its members and its subgroup list.
    fn load(&self) -> Pending<ChatResult> {
        let state = self.state.clone();
        self.core.enqueue(move |core| async move {
            let url = core.ctx().endpoints().group(core.id());
            let response = core.ctx().send(core.ctx().authed(ApiRequest::get(url))).await?;
            if !response.is(200) {
                warn!(group_id = %core.id(), status = response.status, "Group load failed");
                return Ok(ChatResult::from_status(response.status));
            }
            let wire: GroupWire = response.payload("group")?;
            state.apply(&core, &wire)?;

            let url = core.ctx().endpoints().subgroups(core.id());
            let response = core.ctx().send(core.ctx().authed(ApiRequest::get(url))).await?;
            if !response.is(200) {
                warn!(group_id = %core.id(), status = response.status, "Subgroup listing failed");
                return Ok(ChatResult::from_status(response.status));
            }
            let listed: Vec<SubgroupWire> = response.payload("subgroups")?;
            state.reconcile_subgroups(&core, &listed)?;

            info!(
                group_id = %core.id(),
                name = %wire.name,
                members = core.members().len(),
                subgroups = listed.len(),
                "Group loaded"
            );
            Ok(ChatResult::Success)
        })
    }
}

impl Queryable for GroupChat {}

impl Sendable for GroupChat {}

impl Updatable for GroupChat {
    type Changes = GroupUpdate;

    fn update(&self, changes: GroupUpdate) -> Pending<ChatResult> {
        let state = self.state.clone();
        self.core.enqueue(move |core| async move {
            let url = core.ctx().endpoints().group_update(core.id());
            let request = ApiRequest::post(url).json(&changes.to_wire())?;
            let response = core.ctx().send(core.ctx().authed(request)).await?;
            let result = ChatResult::from_status(response.status);
            if result.is_success() {
                let wire: GroupWire = response.payload("group update")?;
                state.apply(&core, &wire)?;
            }
            debug!(group_id = %core.id(), %result, "Group update");
            Ok(result)
        })
    }
}
