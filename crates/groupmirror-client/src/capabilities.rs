//! Behaviour sets a chat can offer.
//!
//! Each method enqueues its work on the chat's serial queue and returns the
//! [`Pending`] handle immediately.

use groupmirror_net::{PageOutcome, PageRequest};
use groupmirror_shared::{ChatResult, GroupId};
use groupmirror_store::{MemberSet, Message};

use crate::chat::ChatCore;
use crate::queue::Pending;

/// Anything backed by a [`ChatCore`].
pub trait Chat {
    fn core(&self) -> &ChatCore;

    fn id(&self) -> &GroupId {
        self.core().id()
    }

    fn members(&self) -> &MemberSet {
        self.core().members()
    }

    /// Operations submitted to this chat and not yet finished.
    fn queued(&self) -> usize {
        self.core().queue().queued()
    }
}

/// Refresh local state from the server.
pub trait Loadable: Chat {
    fn load(&self) -> Pending<ChatResult>;
}

pub trait Queryable: Chat {
    fn query_messages(&self, page: PageRequest) -> Pending<PageOutcome> {
        self.core().enqueue(move |core| async move { core.query(page).await })
    }

    /// Latest page at the configured default size.
    fn query_latest(&self) -> Pending<PageOutcome> {
        let limit = self.core().settings().page_limit;
        self.query_messages(PageRequest::latest(limit))
    }
}

pub trait Sendable: Chat {
    fn send_message(&self, message: Message) -> Pending<ChatResult> {
        self.core()
            .enqueue(move |core| async move { core.send(message).await })
    }
}

pub trait Updatable: Chat {
    type Changes: Send + 'static;

    fn update(&self, changes: Self::Changes) -> Pending<ChatResult>;
}
