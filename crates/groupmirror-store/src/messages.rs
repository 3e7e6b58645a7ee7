//! Timestamp-ordered message history.
//!
//! Ordering key is the creation timestamp, and two messages sharing a
//! timestamp count as the same slot: the first one stays, the later one is
//! dropped and reported as [`InsertOutcome::TimestampCollision`].  A message
//! whose id is already present refreshes the stored copy instead.
//! Nothing is ever removed.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use groupmirror_shared::MessageId;

use crate::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New message, new slot.
    Inserted,
    /// Same message seen again; stored copy replaced with the fresh one.
    Refreshed,
    /// A different message already holds this timestamp; input dropped.
    TimestampCollision,
}

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    by_time: BTreeMap<DateTime<Utc>, Message>,
    slots: HashMap<String, DateTime<Utc>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, message: Message) -> InsertOutcome {
        let key = message.identity_key().to_string();

        if let Some(slot) = self.slots.get(&key).copied() {
            // A message never changes slot once stored.
            if slot == message.created_at {
                self.by_time.insert(slot, message);
            }
            return InsertOutcome::Refreshed;
        }

        if let Some(existing) = self.by_time.get(&message.created_at) {
            warn!(
                kept = existing.identity_key(),
                dropped = %key,
                created_at = %message.created_at,
                "Message timestamp collision, dropping later insert"
            );
            return InsertOutcome::TimestampCollision;
        }

        self.slots.insert(key, message.created_at);
        self.by_time.insert(message.created_at, message);
        InsertOutcome::Inserted
    }

    /// Merge a batch; returns how many new slots were filled.
    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) -> usize {
        messages
            .into_iter()
            .map(|m| self.insert(m))
            .filter(|o| *o == InsertOutcome::Inserted)
            .count()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.by_time.values()
    }

    /// Messages created strictly before `ts`, oldest first.
    pub fn before(&self, ts: DateTime<Utc>) -> impl DoubleEndedIterator<Item = &Message> {
        self.by_time.range(..ts).map(|(_, m)| m)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        let slot = self.slots.get(id.as_str())?;
        self.by_time.get(slot)
    }

    pub fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        let slot = self.slots.get(id.as_str())?;
        self.by_time.get_mut(slot)
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.by_time.values().next()
    }

    pub fn newest(&self) -> Option<&Message> {
        self.by_time.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }
}
