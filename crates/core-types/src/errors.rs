use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error classification shared by every Gatekeeper crate.
///
/// Callers map a kind to a transport status; the crates themselves never
/// speak HTTP.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Forbidden,
    NotFound,
    ResourceLimit,
    Conflict,
    InvalidRequest,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Configuration => 500,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::ResourceLimit => 429,
            ErrorKind::Conflict => 409,
            ErrorKind::InvalidRequest => 400,
            // client closed request
            ErrorKind::Cancelled => 499,
            ErrorKind::Internal => 500,
        }
    }

    /// Only resource-limit failures are worth retrying after a backoff.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ResourceLimit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to parse one of the model's textual forms.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("invalid action: {0}")]
    Action(String),
    #[error("invalid effect: {0}")]
    Effect(String),
    #[error("invalid identity type: {0}")]
    IdentityType(String),
    #[error("invalid http method: {0}")]
    HttpMethod(String),
    #[error("invalid operation `{0}`, expected ACTION:Subject[:field]")]
    Operation(String),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidRequest
    }
}
