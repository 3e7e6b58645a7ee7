/// Application name
pub const APP_NAME: &str = "groupmirror";

/// Header carrying the access token on every API call
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

/// Query parameter carrying the access token (used by message paging)
pub const ACCESS_TOKEN_PARAM: &str = "token";

/// Default REST API root
pub const DEFAULT_API_BASE: &str = "https://api.groupme.com/v3";

/// Default picture service root
pub const DEFAULT_IMAGE_BASE: &str = "https://image.groupme.com";

/// Default file service root
pub const DEFAULT_FILE_BASE: &str = "https://file.groupme.com/v1";

/// Default video service root
pub const DEFAULT_VIDEO_BASE: &str = "https://video.groupme.com";

/// Messages returned per page when the caller does not ask for a count
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page the service will return
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Delay between member-add result checks
pub const MEMBER_POLL_INTERVAL_MS: u64 = 3_000;

/// Delay between file / video completion checks
pub const UPLOAD_POLL_INTERVAL_MS: u64 = 300;

/// Poll attempts before a member-add job is abandoned (~5 minutes)
pub const MEMBER_POLL_MAX_ATTEMPTS: u32 = 100;

/// Poll attempts before an upload job is abandoned (~5 minutes)
pub const UPLOAD_POLL_MAX_ATTEMPTS: u32 = 1_000;

/// Longest video the service accepts, in seconds
pub const MAX_VIDEO_DURATION_SECS: u64 = 60;

/// Default HTTP timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
