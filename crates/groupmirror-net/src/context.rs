//! Everything a request builder needs: where to send, how to authenticate,
//! and which transport carries it.

use std::sync::Arc;

use tracing::debug;

use groupmirror_shared::constants::{
    ACCESS_TOKEN_HEADER, ACCESS_TOKEN_PARAM, DEFAULT_API_BASE, DEFAULT_FILE_BASE,
    DEFAULT_IMAGE_BASE, DEFAULT_VIDEO_BASE,
};
use groupmirror_shared::{GroupId, MessageId};

use crate::error::SyncError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// OAuth access token.  Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Service roots and the URL layout under them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: String,
    image_base: String,
    file_base: String,
    video_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(
            DEFAULT_API_BASE,
            DEFAULT_IMAGE_BASE,
            DEFAULT_FILE_BASE,
            DEFAULT_VIDEO_BASE,
        )
    }
}

impl Endpoints {
    pub fn new(api: &str, image: &str, file: &str, video: &str) -> Self {
        Self {
            api_base: api.trim_end_matches('/').to_string(),
            image_base: image.trim_end_matches('/').to_string(),
            file_base: file.trim_end_matches('/').to_string(),
            video_base: video.trim_end_matches('/').to_string(),
        }
    }

    pub fn group(&self, group: &GroupId) -> String {
        format!("{}/groups/{}", self.api_base, group)
    }

    pub fn group_update(&self, group: &GroupId) -> String {
        format!("{}/update", self.group(group))
    }

    pub fn messages(&self, group: &GroupId) -> String {
        format!("{}/messages", self.group(group))
    }

    pub fn members_add(&self, group: &GroupId) -> String {
        format!("{}/members/add", self.group(group))
    }

    pub fn member_results(&self, group: &GroupId, results_id: &str) -> String {
        format!("{}/members/{}", self.group(group), results_id)
    }

    pub fn member_remove(&self, group: &GroupId, membership_id: &str) -> String {
        format!("{}/members/{}/remove", self.group(group), membership_id)
    }

    pub fn subgroups(&self, parent: &GroupId) -> String {
        format!("{}/subgroups", self.group(parent))
    }

    pub fn subgroup(&self, parent: &GroupId, subgroup: &GroupId) -> String {
        format!("{}/subgroups/{}", self.group(parent), subgroup)
    }

    pub fn change_owners(&self) -> String {
        format!("{}/groups/change_owners", self.api_base)
    }

    pub fn like(&self, group: &GroupId, message: &MessageId) -> String {
        format!("{}/messages/{}/{}/like", self.api_base, group, message)
    }

    pub fn unlike(&self, group: &GroupId, message: &MessageId) -> String {
        format!("{}/messages/{}/{}/unlike", self.api_base, group, message)
    }

    pub fn pictures(&self) -> String {
        format!("{}/pictures", self.image_base)
    }

    pub fn files(&self, group: &GroupId) -> String {
        format!("{}/{}/files", self.file_base, group)
    }

    pub fn video_transcode(&self) -> String {
        format!("{}/transcode", self.video_base)
    }

    /// Status URLs may come back relative to the service that issued them.
    pub fn absolute(&self, base_of: &str, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", base_of.trim_end_matches('/'), url.trim_start_matches('/'))
        }
    }

    pub fn file_base(&self) -> &str {
        &self.file_base
    }

    pub fn video_base(&self) -> &str {
        &self.video_base
    }
}

/// Shared request context handed to every operation.
#[derive(Clone)]
pub struct ApiContext {
    transport: Arc<dyn Transport>,
    token: AccessToken,
    endpoints: Endpoints,
}

impl ApiContext {
    pub fn new(transport: Arc<dyn Transport>, token: AccessToken, endpoints: Endpoints) -> Self {
        Self {
            transport,
            token,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Attach the token as a header.
    pub fn authed(&self, request: ApiRequest) -> ApiRequest {
        request.header(ACCESS_TOKEN_HEADER, self.token.expose())
    }

    /// Attach the token as a query parameter.
    pub fn with_token_param(&self, request: ApiRequest) -> ApiRequest {
        request.query(ACCESS_TOKEN_PARAM, self.token.expose())
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SyncError> {
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "Sending request");
        let response = self.transport.execute(request).await?;
        debug!(%method, %url, status = response.status, "Received response");
        Ok(response)
    }
}

impl std::fmt::Debug for ApiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiContext")
            .field("token", &self.token)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}
