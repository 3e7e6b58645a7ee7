//! # groupmirror-store
//!
//! In-memory mirror of remote group-chat state.
//!
//! The crate holds the entity model ([`User`], [`Message`], [`Attachment`]),
//! the timestamp-ordered [`MessageStore`] every query merges into, the
//! [`MemberSet`] registry that a group shares with its subgroups, and the
//! helpers in [`mirror`] that fold server records into those entities.
//! Nothing here performs I/O.

pub mod members;
pub mod messages;
pub mod mirror;
pub mod models;

mod error;

pub use error::{MirrorError, Result};
pub use members::MemberSet;
pub use messages::{InsertOutcome, MessageStore};
pub use models::*;
