//! Member registry shared between a group and its subgroups.
//!
//! A [`MemberSet`] is a cheap handle; clones point at the same registry and
//! every access goes through the registry's own lock, so a parent group and
//! its subgroups can mutate membership without coordinating their chat locks.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use groupmirror_shared::{GroupId, UserId};

use crate::models::User;

#[derive(Clone, Default)]
pub struct MemberSet {
    inner: Arc<RwLock<BTreeMap<UserId, Arc<User>>>>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users<I: IntoIterator<Item = User>>(users: I) -> Self {
        let set = Self::new();
        for user in users {
            set.upsert(user);
        }
        set
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<UserId, Arc<User>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<UserId, Arc<User>>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a member, keyed by user id.
    ///
    /// Memberships already known for other groups are kept unless the
    /// incoming record names the same group.
    pub fn upsert(&self, mut user: User) -> Arc<User> {
        let mut members = self.write();
        if let Some(existing) = members.get(user.id()) {
            for (group, membership) in &existing.memberships {
                user.memberships
                    .entry(group.clone())
                    .or_insert_with(|| membership.clone());
            }
        }
        let user = Arc::new(user);
        members.insert(user.id().clone(), Arc::clone(&user));
        user
    }

    /// Replace the whole registry with a fresh server listing.
    pub fn replace_all<I: IntoIterator<Item = User>>(&self, users: I) {
        let fresh: Vec<User> = users.into_iter().collect();
        {
            let mut members = self.write();
            let keep: std::collections::BTreeSet<UserId> =
                fresh.iter().map(|u| u.id().clone()).collect();
            members.retain(|id, _| keep.contains(id));
        }
        for user in fresh {
            self.upsert(user);
        }
        debug!(count = self.len(), "Member set replaced");
    }

    pub fn remove(&self, id: &UserId) -> Option<Arc<User>> {
        self.write().remove(id)
    }

    pub fn get(&self, id: &UserId) -> Option<Arc<User>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.read().contains_key(id)
    }

    /// Group-scoped id of `user` inside `group`.
    pub fn membership_id(&self, user: &UserId, group: &GroupId) -> Option<String> {
        self.read()
            .get(user)
            .and_then(|u| u.membership_in(group).map(str::to_string))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the current members, ordered by user id.
    pub fn snapshot(&self) -> Vec<Arc<User>> {
        self.read().values().cloned().collect()
    }

    /// Whether both handles point at the same registry.
    pub fn ptr_eq(&self, other: &MemberSet) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for MemberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberSet").field("len", &self.len()).finish()
    }
}
