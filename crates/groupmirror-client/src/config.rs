//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so only the access token has to be
//! supplied to talk to the public service.

use std::time::Duration;

use groupmirror_net::{AccessToken, Endpoints, PollPolicy, UploadSettings};
use groupmirror_shared::constants::{
    DEFAULT_API_BASE, DEFAULT_FILE_BASE, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_IMAGE_BASE,
    DEFAULT_PAGE_LIMIT, DEFAULT_VIDEO_BASE, MAX_VIDEO_DURATION_SECS, MEMBER_POLL_INTERVAL_MS,
    MEMBER_POLL_MAX_ATTEMPTS, UPLOAD_POLL_INTERVAL_MS, UPLOAD_POLL_MAX_ATTEMPTS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Access token sent with every request.
    /// Env: `GROUPMIRROR_TOKEN`
    /// Default: none.
    pub token: Option<AccessToken>,

    /// Env: `GROUPMIRROR_API_BASE`
    /// Default: `https://api.groupme.com/v3`
    pub api_base: String,

    /// Env: `GROUPMIRROR_IMAGE_BASE`
    /// Default: `https://image.groupme.com`
    pub image_base: String,

    /// Env: `GROUPMIRROR_FILE_BASE`
    /// Default: `https://file.groupme.com/v1`
    pub file_base: String,

    /// Env: `GROUPMIRROR_VIDEO_BASE`
    /// Default: `https://video.groupme.com`
    pub video_base: String,

    /// Per-request timeout.
    /// Env: `GROUPMIRROR_HTTP_TIMEOUT_SECS`
    /// Default: 30 s
    pub http_timeout: Duration,

    /// Pause between member-add result checks.
    /// Env: `GROUPMIRROR_MEMBER_POLL_MS`
    /// Default: 3000 ms
    pub member_poll_interval: Duration,

    /// Pause between file/video status checks.
    /// Env: `GROUPMIRROR_UPLOAD_POLL_MS`
    /// Default: 300 ms
    pub upload_poll_interval: Duration,

    /// Env: `GROUPMIRROR_POLL_MAX_ATTEMPTS` (overrides both limits)
    /// Default: 100
    pub member_poll_max_attempts: u32,

    /// Env: `GROUPMIRROR_POLL_MAX_ATTEMPTS` (overrides both limits)
    /// Default: 1000
    pub upload_poll_max_attempts: u32,

    /// Longest video accepted for upload.
    /// Env: `GROUPMIRROR_MAX_VIDEO_SECS`
    /// Default: 60 s
    pub max_video_duration: Duration,

    /// Page size used when the caller does not pick one.
    /// Env: `GROUPMIRROR_PAGE_LIMIT`
    /// Default: 20
    pub page_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            file_base: DEFAULT_FILE_BASE.to_string(),
            video_base: DEFAULT_VIDEO_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            member_poll_interval: Duration::from_millis(MEMBER_POLL_INTERVAL_MS),
            upload_poll_interval: Duration::from_millis(UPLOAD_POLL_INTERVAL_MS),
            member_poll_max_attempts: MEMBER_POLL_MAX_ATTEMPTS,
            upload_poll_max_attempts: UPLOAD_POLL_MAX_ATTEMPTS,
            max_video_duration: Duration::from_secs(MAX_VIDEO_DURATION_SECS),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(token) = lookup("GROUPMIRROR_TOKEN") {
            if !token.is_empty() {
                config.token = Some(AccessToken::new(token));
            }
        }

        if let Some(url) = lookup("GROUPMIRROR_API_BASE") {
            config.api_base = url;
        }
        if let Some(url) = lookup("GROUPMIRROR_IMAGE_BASE") {
            config.image_base = url;
        }
        if let Some(url) = lookup("GROUPMIRROR_FILE_BASE") {
            config.file_base = url;
        }
        if let Some(url) = lookup("GROUPMIRROR_VIDEO_BASE") {
            config.video_base = url;
        }

        if let Some(val) = lookup("GROUPMIRROR_HTTP_TIMEOUT_SECS") {
            if let Some(secs) = parse_or_warn::<u64>("GROUPMIRROR_HTTP_TIMEOUT_SECS", &val) {
                config.http_timeout = Duration::from_secs(secs);
            }
        }

        // -- Polling --

        if let Some(val) = lookup("GROUPMIRROR_MEMBER_POLL_MS") {
            if let Some(ms) = parse_or_warn::<u64>("GROUPMIRROR_MEMBER_POLL_MS", &val) {
                config.member_poll_interval = Duration::from_millis(ms);
            }
        }
        if let Some(val) = lookup("GROUPMIRROR_UPLOAD_POLL_MS") {
            if let Some(ms) = parse_or_warn::<u64>("GROUPMIRROR_UPLOAD_POLL_MS", &val) {
                config.upload_poll_interval = Duration::from_millis(ms);
            }
        }
        if let Some(val) = lookup("GROUPMIRROR_POLL_MAX_ATTEMPTS") {
            match parse_or_warn::<u32>("GROUPMIRROR_POLL_MAX_ATTEMPTS", &val) {
                Some(0) => tracing::warn!("GROUPMIRROR_POLL_MAX_ATTEMPTS must be positive, using defaults"),
                Some(n) => {
                    config.member_poll_max_attempts = n;
                    config.upload_poll_max_attempts = n;
                }
                None => {}
            }
        }

        // -- Content --

        if let Some(val) = lookup("GROUPMIRROR_MAX_VIDEO_SECS") {
            if let Some(secs) = parse_or_warn::<u64>("GROUPMIRROR_MAX_VIDEO_SECS", &val) {
                config.max_video_duration = Duration::from_secs(secs);
            }
        }
        if let Some(val) = lookup("GROUPMIRROR_PAGE_LIMIT") {
            if let Some(n) = parse_or_warn::<u32>("GROUPMIRROR_PAGE_LIMIT", &val) {
                config.page_limit = n;
            }
        }

        // RUST_LOG is read by the binary's EnvFilter.

        config
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(
            &self.api_base,
            &self.image_base,
            &self.file_base,
            &self.video_base,
        )
    }

    pub fn member_poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.member_poll_interval, self.member_poll_max_attempts)
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            policy: PollPolicy::new(self.upload_poll_interval, self.upload_poll_max_attempts),
            max_video: self.max_video_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.token.is_none());
        assert_eq!(config.member_poll_policy().interval, Duration::from_millis(3000));
        assert_eq!(config.upload_settings().policy.interval, Duration::from_millis(300));
        assert_eq!(config.upload_settings().max_video, Duration::from_secs(60));
        assert_eq!(config.page_limit, 20);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GROUPMIRROR_TOKEN", "abc"),
            ("GROUPMIRROR_API_BASE", "http://localhost:9000/v3/"),
            ("GROUPMIRROR_POLL_MAX_ATTEMPTS", "7"),
            ("GROUPMIRROR_MEMBER_POLL_MS", "10"),
        ]));
        assert_eq!(config.token, Some(AccessToken::new("abc")));
        assert_eq!(config.member_poll_policy(), PollPolicy::new(Duration::from_millis(10), 7));
        assert_eq!(config.upload_poll_max_attempts, 7);
        assert_eq!(
            config.endpoints().group(&"1".into()),
            "http://localhost:9000/v3/groups/1"
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("GROUPMIRROR_HTTP_TIMEOUT_SECS", "soon"),
            ("GROUPMIRROR_POLL_MAX_ATTEMPTS", "0"),
            ("GROUPMIRROR_TOKEN", ""),
        ]));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.member_poll_max_attempts, 100);
        assert!(config.token.is_none());
    }
}
