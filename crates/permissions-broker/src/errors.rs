use gatekeeper_core_types::{ErrorKind, HttpMethod, IdentityPermissionKey};
use gatekeeper_group_registry::GroupError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors produced by permission sources.
#[derive(Clone, Debug, Error)]
pub enum SourceError {
    /// The route is neither secured nor ignored: a configuration defect,
    /// not a denial.
    #[error("route {method} {route} is not secured")]
    RouteNotSecured { route: String, method: HttpMethod },
    #[error("group {0} not found")]
    GroupNotFound(String),
    /// A stored record already holds this key with different content.
    #[error("identity permission {0} already exists; delete it before re-creating")]
    AlreadyExists(IdentityPermissionKey),
    #[error("too many permissions for {identity}: limit is {limit}")]
    TooManyRequests { identity: String, limit: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("group lookup failed: {0}")]
    Group(#[from] GroupError),
    #[error("permission store failure: {0}")]
    Store(#[from] StoreError),
    #[error("lookup cancelled")]
    Cancelled,
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::RouteNotSecured { .. } => ErrorKind::Configuration,
            SourceError::GroupNotFound(_) => ErrorKind::NotFound,
            SourceError::AlreadyExists(_) => ErrorKind::Conflict,
            SourceError::TooManyRequests { .. } => ErrorKind::ResourceLimit,
            SourceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SourceError::Group(err) => err.kind(),
            SourceError::Store(_) => ErrorKind::Internal,
            SourceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors surfaced by the authorization façade.
///
/// Only denials are reworded; every other failure keeps its source kind.
#[derive(Clone, Debug, Error)]
pub enum AuthzError {
    #[error("User is forbidden: {reason}")]
    Forbidden { reason: String },
    #[error("authorization cancelled")]
    Cancelled,
    #[error(transparent)]
    Source(SourceError),
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::Forbidden { .. } => ErrorKind::Forbidden,
            AuthzError::Cancelled => ErrorKind::Cancelled,
            AuthzError::Source(err) => err.kind(),
        }
    }

    /// Engine reason without the façade prefix.
    pub fn reason(&self) -> Option<&str> {
        match self {
            AuthzError::Forbidden { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<SourceError> for AuthzError {
    fn from(value: SourceError) -> Self {
        match value {
            SourceError::Cancelled => AuthzError::Cancelled,
            other => AuthzError::Source(other),
        }
    }
}
