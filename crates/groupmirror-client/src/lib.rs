//! # groupmirror-client
//!
//! Mirrored group chats.  A [`GroupChat`] and its [`SubGroupChat`]s each
//! run their operations on a private [`SerialQueue`]; every operation
//! returns a [`Pending`] handle the caller awaits when it wants the result.
//! What a chat can do is expressed through the capability traits in
//! [`capabilities`].

pub mod capabilities;
pub mod chat;
pub mod client;
pub mod config;
pub mod group;
pub mod queue;
pub mod subgroup;

pub use capabilities::{Chat, Loadable, Queryable, Sendable, Updatable};
pub use chat::{ChatCore, ChatSettings};
pub use client::GroupMirror;
pub use config::ClientConfig;
pub use group::{
    CreateOutcome, DestroyOutcome, GroupChat, GroupProfile, GroupSettings, GroupUpdate,
    SubGroupSelector,
};
pub use queue::{Pending, SerialQueue};
pub use subgroup::{SubGroupChat, SubgroupProfile, SubgroupSnapshot, SubgroupUpdate};
