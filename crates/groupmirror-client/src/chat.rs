//! Machinery shared by every chat variant.
//!
//! [`ChatCore`] bundles a chat's identity, its request context, the member
//! set (possibly shared with related chats), the message store and the
//! serial queue.  Concrete chats compose it and expose the capabilities
//! they support; the operations here are the bodies those capabilities
//! enqueue.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use groupmirror_net::{
    query_into, upload_attachment, ApiContext, ApiRequest, DurationProbe, PageOutcome,
    PageRequest, PollPolicy, SyncError, UnknownDuration, UploadSettings,
};
use groupmirror_shared::protocol::{NewMessageRequest, SentMessage};
use groupmirror_shared::{ChatResult, GroupId, MessageId, UserId};
use groupmirror_store::mirror::message_from_wire;
use groupmirror_store::{MemberSet, Message, MessageStore};

use crate::queue::{Pending, SerialQueue};

/// Tunables every chat carries.
#[derive(Clone)]
pub struct ChatSettings {
    pub member_poll: PollPolicy,
    pub upload: UploadSettings,
    pub page_limit: u32,
    pub probe: Arc<dyn DurationProbe>,
    /// Closes every chat built from these settings.  Per-operation polling
    /// runs on child tokens of this one.
    pub cancel: CancellationToken,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            member_poll: PollPolicy::new(
                std::time::Duration::from_millis(
                    groupmirror_shared::constants::MEMBER_POLL_INTERVAL_MS,
                ),
                groupmirror_shared::constants::MEMBER_POLL_MAX_ATTEMPTS,
            ),
            upload: UploadSettings::default(),
            page_limit: groupmirror_shared::constants::DEFAULT_PAGE_LIMIT,
            probe: Arc::new(UnknownDuration),
            cancel: CancellationToken::new(),
        }
    }
}

impl ChatSettings {
    /// Same settings with a cancellation token that is cancelled along with
    /// this one but can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for ChatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSettings")
            .field("member_poll", &self.member_poll)
            .field("upload", &self.upload)
            .field("page_limit", &self.page_limit)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ChatCore {
    id: GroupId,
    ctx: ApiContext,
    settings: ChatSettings,
    members: MemberSet,
    messages: Arc<RwLock<MessageStore>>,
    queue: SerialQueue,
    /// Token handed to operations that poll; replaced on `cancel_pending`.
    polls: Arc<Mutex<CancellationToken>>,
}

impl ChatCore {
    /// Must be called from within a Tokio runtime; spawns the chat's worker.
    pub fn new(id: GroupId, ctx: ApiContext, settings: ChatSettings, members: MemberSet) -> Self {
        let queue = SerialQueue::spawn(id.as_str());
        let polls = Arc::new(Mutex::new(settings.cancel.child_token()));
        Self {
            id,
            ctx,
            settings,
            members,
            messages: Arc::new(RwLock::new(MessageStore::new())),
            queue,
            polls,
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn ctx(&self) -> &ApiContext {
        &self.ctx
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn members(&self) -> &MemberSet {
        &self.members
    }

    pub fn messages(&self) -> &Arc<RwLock<MessageStore>> {
        &self.messages
    }

    pub fn queue(&self) -> &SerialQueue {
        &self.queue
    }

    /// Token for an operation starting now.
    pub fn poll_token(&self) -> CancellationToken {
        self.polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Abandon polling already in flight.  Operations started afterwards
    /// get a fresh token and run normally.
    pub fn cancel_pending(&self) {
        let fresh = self.settings.cancel.child_token();
        let stale = std::mem::replace(
            &mut *self.polls.lock().unwrap_or_else(PoisonError::into_inner),
            fresh,
        );
        stale.cancel();
        debug!(chat = %self.id, "Cancelled in-flight polling");
    }

    /// Cancel everything this chat will ever poll.
    pub fn close(&self) {
        self.settings.cancel.cancel();
    }

    /// Run `op` on this chat's queue with a handle to the core.
    pub fn enqueue<T, F, Fut>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(ChatCore) -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        self.queue.submit(op(self.clone()))
    }

    // -----------------------------------------------------------------------
    // Operation bodies
    // -----------------------------------------------------------------------

    pub(crate) async fn query(&self, page: PageRequest) -> Result<PageOutcome, SyncError> {
        let outcome =
            query_into(&self.ctx, &self.id, &page, &self.members, &self.messages).await?;
        info!(
            chat = %self.id,
            result = %outcome.result,
            received = outcome.received,
            inserted = outcome.inserted,
            "Queried messages"
        );
        Ok(outcome)
    }

    /// Upload outstanding attachments, then post the message.
    pub(crate) async fn send(&self, message: Message) -> Result<ChatResult, SyncError> {
        let cancel = self.poll_token();
        for attachment in message.attachments.iter().filter(|a| !a.is_resolved()) {
            let outcome = upload_attachment(
                &self.ctx,
                &self.id,
                attachment,
                self.settings.probe.as_ref(),
                &self.settings.upload,
                &cancel,
            )
            .await?;
            let result = outcome.result();
            if !result.is_success() {
                warn!(chat = %self.id, ?outcome, "Attachment upload did not complete, message not sent");
                return Ok(result);
            }
        }

        let body = NewMessageRequest {
            message: message.to_outgoing()?,
        };
        let request = ApiRequest::post(self.ctx.endpoints().messages(&self.id)).json(&body)?;
        let response = self.ctx.send(self.ctx.authed(request)).await?;
        let result = ChatResult::from_status(response.status);
        if !result.is_success() {
            warn!(chat = %self.id, status = response.status, "Message rejected");
            return Ok(result);
        }

        let sent: SentMessage = response.payload("sent message")?;
        let stored = message_from_wire(sent.message, &self.members)?;
        let outcome = self.messages.write().await.insert(stored);
        debug!(chat = %self.id, ?outcome, "Stored sent message");
        Ok(result)
    }

    /// Like or unlike `message` on behalf of `viewer`.
    pub(crate) async fn set_liked(
        &self,
        message: MessageId,
        viewer: UserId,
        liked: bool,
    ) -> Result<ChatResult, SyncError> {
        let endpoints = self.ctx.endpoints();
        let url = if liked {
            endpoints.like(&self.id, &message)
        } else {
            endpoints.unlike(&self.id, &message)
        };
        let response = self.ctx.send(self.ctx.authed(ApiRequest::post(url))).await?;
        let result = ChatResult::from_status(response.status);
        if result.is_success() {
            let mut store = self.messages.write().await;
            if let Some(stored) = store.get_mut(&message) {
                if liked {
                    stored.favorited_by.insert(viewer);
                } else {
                    stored.favorited_by.remove(&viewer);
                }
            }
        }
        debug!(chat = %self.id, message_id = %message, liked, %result, "Like toggled");
        Ok(result)
    }
}

impl std::fmt::Debug for ChatCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCore")
            .field("id", &self.id)
            .field("members", &self.members)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
