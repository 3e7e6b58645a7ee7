//! # groupmirror-shared
//!
//! Types shared by every groupmirror crate: identifiers, the closed
//! [`ChatResult`] outcome enumeration, service constants, and the JSON
//! record shapes exchanged with the group-chat HTTP API.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::WireError;
pub use types::{ChatResult, GroupId, MessageId, UserId};
