use gatekeeper_core_types::ErrorKind;
use thiserror::Error;

use crate::model::GroupStatus;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GroupError {
    #[error("group {0} not found")]
    NotFound(String),
    #[error("group {0} already exists")]
    AlreadyExists(String),
    #[error("group {group_id} is {status}, the change requires an active group")]
    NotActive {
        group_id: String,
        status: GroupStatus,
    },
    #[error("group {group_id} cannot move from {from} to {to}")]
    InvalidTransition {
        group_id: String,
        from: GroupStatus,
        to: GroupStatus,
    },
    #[error("group {group_id} must be deleted before removal, current status is {status}")]
    NotDeleted {
        group_id: String,
        status: GroupStatus,
    },
    #[error("group {group_id} still has {members} member(s)")]
    NotEmpty { group_id: String, members: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("group backend failure: {0}")]
    Backend(String),
}

impl GroupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GroupError::NotFound(_) => ErrorKind::NotFound,
            GroupError::AlreadyExists(_)
            | GroupError::NotActive { .. }
            | GroupError::InvalidTransition { .. }
            | GroupError::NotDeleted { .. }
            | GroupError::NotEmpty { .. } => ErrorKind::Conflict,
            GroupError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GroupError::Backend(_) => ErrorKind::Internal,
        }
    }
}
