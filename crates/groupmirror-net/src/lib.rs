// Request plumbing for the group-chat HTTP API: transport boundary,
// message paging, and the submit-then-poll protocol shared by member adds
// and media uploads.

pub mod context;
pub mod error;
pub mod lro;
pub mod media;
pub mod membership;
pub mod pagination;
pub mod transport;
pub mod upload;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::{AccessToken, ApiContext, Endpoints};
pub use error::{AttachmentError, SyncError, TransportError};
pub use lro::{run_lro, LongRunningOp, LroOutcome, LroStage, PollPolicy, PollVerdict, Submission};
pub use media::{ensure_within_limit, DurationProbe, KnownDuration, UnknownDuration};
pub use membership::{MemberAdd, MemberContact, NewMember};
pub use pagination::{query_into, MessageQuery, PageOutcome, PageRequest};
pub use transport::{ApiRequest, ApiResponse, Method, MultipartBody, Part, RequestBody, ReqwestTransport, Transport};
pub use upload::{upload_attachment, UploadSettings};
