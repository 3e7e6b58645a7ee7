//! Entry point tying configuration, transport and chats together.

use std::sync::Arc;

use tracing::info;

use groupmirror_net::{AccessToken, ApiContext, DurationProbe, ReqwestTransport, Transport, TransportError};
use groupmirror_shared::GroupId;

use crate::chat::ChatSettings;
use crate::config::ClientConfig;
use crate::group::GroupChat;

/// Factory for chats that share one transport, token and settings.
#[derive(Debug, Clone)]
pub struct GroupMirror {
    ctx: ApiContext,
    settings: ChatSettings,
}

impl GroupMirror {
    /// Client over an explicit transport.
    pub fn new(config: &ClientConfig, token: AccessToken, transport: Arc<dyn Transport>) -> Self {
        let ctx = ApiContext::new(transport, token, config.endpoints());
        let settings = ChatSettings {
            member_poll: config.member_poll_policy(),
            upload: config.upload_settings(),
            page_limit: config.page_limit,
            ..ChatSettings::default()
        };
        Self { ctx, settings }
    }

    /// Client over HTTPS with the configured timeout.
    pub fn connect(config: &ClientConfig, token: AccessToken) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        info!(api = %config.api_base, "Client ready");
        Ok(Self::new(config, token, Arc::new(transport)))
    }

    /// Use `probe` to measure video before upload.
    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.settings.probe = probe;
        self
    }

    pub fn context(&self) -> &ApiContext {
        &self.ctx
    }

    /// A handle to group `id`, not yet loaded.  Each call yields an
    /// independent chat with its own queue.
    pub fn group(&self, id: impl Into<GroupId>) -> GroupChat {
        GroupChat::new(id, self.ctx.clone(), self.settings.child())
    }

    /// Cancel polling in every chat this client created.
    pub fn shutdown(&self) {
        info!("Cancelling outstanding operations");
        self.settings.cancel.cancel();
    }
}
