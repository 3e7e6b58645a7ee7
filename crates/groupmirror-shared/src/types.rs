use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Server-assigned id of a group or subgroup.
    GroupId
);

string_id!(
    /// Global user id (not the group-scoped membership id).
    UserId
);

string_id!(
    /// Server-assigned message id.
    MessageId
);

/// Business-level outcome of a chat operation.
///
/// Anticipated failure modes travel here; transport and decoding faults
/// travel as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatResult {
    Success,
    Failure,
    ResultsExpired,
    NotFound,
    InvalidQueryType,
    RequesterIsNewOwner,
    RequesterIsNotOwner,
    MissingData,
}

impl ChatResult {
    /// Generic status mapping used by plain request/response calls.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=204 => Self::Success,
            404 => Self::NotFound,
            _ => Self::Failure,
        }
    }

    /// Mapping for the per-request status strings of an ownership change.
    pub fn from_owner_change_status(status: &str) -> Self {
        match status {
            "200" => Self::Success,
            "400" => Self::RequesterIsNewOwner,
            "403" => Self::RequesterIsNotOwner,
            "404" => Self::NotFound,
            "405" => Self::MissingData,
            _ => Self::Failure,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl std::fmt::Display for ChatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::ResultsExpired => "results expired",
            Self::NotFound => "not found",
            Self::InvalidQueryType => "invalid query type",
            Self::RequesterIsNewOwner => "requester is new owner",
            Self::RequesterIsNotOwner => "requester is not owner",
            Self::MissingData => "missing data",
        };
        f.write_str(s)
    }
}
