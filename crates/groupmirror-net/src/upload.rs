//! Attachment upload.
//!
//! Pictures go to the image service and usually finish at submit.  Files
//! and video are accepted as jobs and polled through the `status_url` the
//! service hands back.  A resolved locator is cached on the attachment, so
//! uploading the same attachment again sends nothing.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use groupmirror_shared::constants::{
    MAX_VIDEO_DURATION_SECS, UPLOAD_POLL_INTERVAL_MS, UPLOAD_POLL_MAX_ATTEMPTS,
};
use groupmirror_shared::protocol::{
    Envelope, FileJobStatus, PictureUploaded, StatusLocation, VideoJobStatus,
};
use groupmirror_shared::{GroupId, WireError};
use groupmirror_store::{Attachment, AttachmentContent, AttachmentKind, ResolvedLocator};

use crate::context::ApiContext;
use crate::error::{AttachmentError, SyncError};
use crate::lro::{run_lro, LongRunningOp, LroOutcome, PollPolicy, PollVerdict, Submission};
use crate::media::{ensure_within_limit, DurationProbe};
use crate::transport::{ApiRequest, ApiResponse, MultipartBody};

const CONVERSATION_HEADER: &str = "X-Conversation-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    pub policy: PollPolicy,
    pub max_video: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            policy: PollPolicy::new(
                Duration::from_millis(UPLOAD_POLL_INTERVAL_MS),
                UPLOAD_POLL_MAX_ATTEMPTS,
            ),
            max_video: Duration::from_secs(MAX_VIDEO_DURATION_SECS),
        }
    }
}

fn content_type(kind: AttachmentKind, file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match (kind, ext.as_str()) {
        (AttachmentKind::Picture, "png") => "image/png",
        (AttachmentKind::Picture, "gif") => "image/gif",
        (AttachmentKind::Picture, "webp") => "image/webp",
        (AttachmentKind::Picture, _) => "image/jpeg",
        (AttachmentKind::Video, "mov") => "video/quicktime",
        (AttachmentKind::Video, _) => "video/mp4",
        (AttachmentKind::File, "pdf") => "application/pdf",
        (AttachmentKind::File, _) => "application/octet-stream",
    }
}

/// The file and video services answer with a bare `{status_url}` or with
/// the usual envelope depending on endpoint version.
fn status_location(response: &ApiResponse, context: &'static str) -> Result<String, SyncError> {
    if let Ok(location) = serde_json::from_slice::<StatusLocation>(&response.body) {
        return Ok(location.status_url);
    }
    let location: StatusLocation = response.payload(context)?;
    Ok(location.status_url)
}

fn job_status<T: serde::de::DeserializeOwned>(
    response: &ApiResponse,
    context: &'static str,
) -> Result<T, SyncError> {
    if let Ok(Envelope {
        response: Some(inner),
        ..
    }) = serde_json::from_slice::<Envelope<T>>(&response.body)
    {
        return Ok(inner);
    }
    response.json(context)
}

// ---------------------------------------------------------------------------
// Picture
// ---------------------------------------------------------------------------

pub struct PictureUpload {
    data: Bytes,
    content_type: &'static str,
}

#[async_trait]
impl LongRunningOp for PictureUpload {
    type Handle = String;
    type Output = ResolvedLocator;

    fn name(&self) -> &'static str {
        "picture-upload"
    }

    async fn submit_request(&self, ctx: &ApiContext) -> Result<ApiRequest, SyncError> {
        Ok(ctx.authed(
            ApiRequest::post(ctx.endpoints().pictures()).binary(self.content_type, self.data.clone()),
        ))
    }

    fn accept(
        &self,
        response: &ApiResponse,
    ) -> Result<Submission<String, ResolvedLocator>, SyncError> {
        match response.status {
            200 | 201 => {
                let uploaded: PictureUploaded = response.json("picture upload")?;
                Ok(Submission::Finished(ResolvedLocator::Picture {
                    url: uploaded.payload.picture_url,
                }))
            }
            202 => Ok(Submission::Accepted(status_location(response, "picture upload")?)),
            other => Ok(Submission::Rejected(other)),
        }
    }

    fn poll_request(&self, ctx: &ApiContext, status_url: &String) -> ApiRequest {
        let url = ctx.endpoints().absolute(&ctx.endpoints().pictures(), status_url);
        ctx.authed(ApiRequest::get(url))
    }

    fn classify(&self, response: &ApiResponse) -> Result<PollVerdict<ResolvedLocator>, SyncError> {
        Ok(match response.status {
            200 | 201 => {
                let uploaded: PictureUploaded = response.json("picture status")?;
                PollVerdict::Ready(ResolvedLocator::Picture {
                    url: uploaded.payload.picture_url,
                })
            }
            202 | 503 => PollVerdict::NotReady,
            404 => PollVerdict::Gone,
            other => PollVerdict::Failed(other),
        })
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

pub struct FileUpload {
    group: GroupId,
    name: String,
    data: Bytes,
    content_type: &'static str,
}

#[async_trait]
impl LongRunningOp for FileUpload {
    type Handle = String;
    type Output = ResolvedLocator;

    fn name(&self) -> &'static str {
        "file-upload"
    }

    async fn submit_request(&self, ctx: &ApiContext) -> Result<ApiRequest, SyncError> {
        let request = ApiRequest::post(ctx.endpoints().files(&self.group))
            .query("name", self.name.as_str())
            .binary(self.content_type, self.data.clone());
        Ok(ctx.authed(request))
    }

    fn accept(
        &self,
        response: &ApiResponse,
    ) -> Result<Submission<String, ResolvedLocator>, SyncError> {
        match response.status {
            200..=202 => Ok(Submission::Accepted(status_location(response, "file upload")?)),
            other => Ok(Submission::Rejected(other)),
        }
    }

    fn poll_request(&self, ctx: &ApiContext, status_url: &String) -> ApiRequest {
        let url = ctx.endpoints().absolute(ctx.endpoints().file_base(), status_url);
        ctx.authed(ApiRequest::get(url))
    }

    fn classify(&self, response: &ApiResponse) -> Result<PollVerdict<ResolvedLocator>, SyncError> {
        Ok(match response.status {
            200 => {
                let job: FileJobStatus = job_status(response, "file status")?;
                match job.file_id {
                    Some(file_id) if !file_id.is_empty() => {
                        PollVerdict::Ready(ResolvedLocator::File { file_id })
                    }
                    _ => {
                        debug!(status = ?job.status, "File still processing");
                        PollVerdict::NotReady
                    }
                }
            }
            202 | 503 => PollVerdict::NotReady,
            404 => PollVerdict::Gone,
            other => PollVerdict::Failed(other),
        })
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

pub struct VideoUpload {
    group: GroupId,
    file_name: String,
    data: Bytes,
    content_type: &'static str,
}

#[async_trait]
impl LongRunningOp for VideoUpload {
    type Handle = String;
    type Output = ResolvedLocator;

    fn name(&self) -> &'static str {
        "video-upload"
    }

    async fn submit_request(&self, ctx: &ApiContext) -> Result<ApiRequest, SyncError> {
        let body = MultipartBody::new().file(
            "file",
            self.file_name.as_str(),
            self.content_type,
            self.data.clone(),
        );
        let request = ApiRequest::post(ctx.endpoints().video_transcode())
            .header(CONVERSATION_HEADER, self.group.as_str())
            .multipart(body);
        Ok(ctx.authed(request))
    }

    fn accept(
        &self,
        response: &ApiResponse,
    ) -> Result<Submission<String, ResolvedLocator>, SyncError> {
        match response.status {
            200..=202 => Ok(Submission::Accepted(status_location(response, "video upload")?)),
            other => Ok(Submission::Rejected(other)),
        }
    }

    fn poll_request(&self, ctx: &ApiContext, status_url: &String) -> ApiRequest {
        let url = ctx.endpoints().absolute(ctx.endpoints().video_base(), status_url);
        ctx.authed(ApiRequest::get(url))
    }

    fn classify(&self, response: &ApiResponse) -> Result<PollVerdict<ResolvedLocator>, SyncError> {
        Ok(match response.status {
            201 => {
                let job: VideoJobStatus = job_status(response, "video status")?;
                let url = job.url.ok_or(WireError::MissingField("url"))?;
                PollVerdict::Ready(ResolvedLocator::Video {
                    url,
                    preview_url: job.thumbnail_url,
                })
            }
            200 | 503 => PollVerdict::NotReady,
            404 => PollVerdict::Gone,
            other => PollVerdict::Failed(other),
        })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

async fn read_content(attachment: &Attachment) -> Result<Bytes, SyncError> {
    match attachment.content() {
        AttachmentContent::Bytes(data) => Ok(data.clone()),
        AttachmentContent::LocalPath(path) => tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| {
                AttachmentError::Unreadable {
                    path: path.clone(),
                    source,
                }
                .into()
            }),
        AttachmentContent::Remote(_) => Ok(Bytes::new()),
    }
}

fn remote_locator(kind: AttachmentKind, remote: &str) -> Result<ResolvedLocator, AttachmentError> {
    match kind {
        AttachmentKind::Picture => Ok(ResolvedLocator::Picture {
            url: remote.to_string(),
        }),
        AttachmentKind::Video => Ok(ResolvedLocator::Video {
            url: remote.to_string(),
            preview_url: None,
        }),
        // Files are addressed by id; build those with `Attachment::from_resolved`.
        AttachmentKind::File => Err(AttachmentError::RemoteFile(remote.to_string())),
    }
}

/// Why a resolution attempt left the attachment unresolved.
enum Unresolved {
    Fault(SyncError),
    Unfinished(LroOutcome<ResolvedLocator>),
}

/// Upload `attachment` to the service matching its kind and cache the
/// resulting locator on it.
///
/// An already resolved attachment returns its cached locator without any
/// request, and clones uploading concurrently share a single upload.
/// Video longer than `settings.max_video` and unreadable local files are
/// refused with an error before anything is sent.
pub async fn upload_attachment(
    ctx: &ApiContext,
    group: &GroupId,
    attachment: &Attachment,
    probe: &dyn DurationProbe,
    settings: &UploadSettings,
    cancel: &CancellationToken,
) -> Result<LroOutcome<ResolvedLocator>, SyncError> {
    if let Some(locator) = attachment.resolved() {
        debug!(group_id = %group, "Attachment already resolved");
        return Ok(LroOutcome::Completed(locator.clone()));
    }

    let resolved = attachment
        .resolve_with(move || async move {
            match upload_once(ctx, group, attachment, probe, settings, cancel).await {
                Ok(LroOutcome::Completed(locator)) => Ok(locator),
                Ok(other) => Err(Unresolved::Unfinished(other)),
                Err(e) => Err(Unresolved::Fault(e)),
            }
        })
        .await;

    match resolved {
        Ok(locator) => Ok(LroOutcome::Completed(locator.clone())),
        Err(Unresolved::Unfinished(outcome)) => Ok(outcome),
        Err(Unresolved::Fault(e)) => Err(e),
    }
}

async fn upload_once(
    ctx: &ApiContext,
    group: &GroupId,
    attachment: &Attachment,
    probe: &dyn DurationProbe,
    settings: &UploadSettings,
    cancel: &CancellationToken,
) -> Result<LroOutcome<ResolvedLocator>, SyncError> {
    let kind = attachment.kind();
    if let AttachmentContent::Remote(remote) = attachment.content() {
        return Ok(LroOutcome::Completed(remote_locator(kind, remote)?));
    }

    ensure_within_limit(kind, attachment.content(), probe, settings.max_video)?;
    let data = read_content(attachment).await?;
    let file_name = attachment.file_name();
    let content_type = content_type(kind, &file_name);
    info!(group_id = %group, ?kind, size = data.len(), "Uploading attachment");

    match kind {
        AttachmentKind::Picture => {
            let op = PictureUpload { data, content_type };
            run_lro(ctx, &op, settings.policy, cancel).await
        }
        AttachmentKind::File => {
            let op = FileUpload {
                group: group.clone(),
                name: file_name,
                data,
                content_type,
            };
            run_lro(ctx, &op, settings.policy, cancel).await
        }
        AttachmentKind::Video => {
            let op = VideoUpload {
                group: group.clone(),
                file_name,
                data,
                content_type,
            };
            run_lro(ctx, &op, settings.policy, cancel).await
        }
    }
}
