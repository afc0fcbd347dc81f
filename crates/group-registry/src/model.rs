use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle: `active -> delete_pending -> deleted`, `deleted` is terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Active,
    DeletePending,
    Deleted,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Active => "active",
            GroupStatus::DeletePending => "delete_pending",
            GroupStatus::Deleted => "deleted",
        }
    }

    /// Moves are one step forward only; re-setting the current status is a
    /// no-op and always allowed.
    pub fn can_transition_to(self, next: GroupStatus) -> bool {
        matches!(
            (self, next),
            (GroupStatus::Active, GroupStatus::Active)
                | (GroupStatus::Active, GroupStatus::DeletePending)
                | (GroupStatus::DeletePending, GroupStatus::DeletePending)
                | (GroupStatus::DeletePending, GroupStatus::Deleted)
                | (GroupStatus::Deleted, GroupStatus::Deleted)
        )
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(GroupStatus::Active),
            "delete_pending" => Ok(GroupStatus::DeletePending),
            "deleted" => Ok(GroupStatus::Deleted),
            other => Err(format!("unknown group status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: GroupStatus,
}

/// `group_id` is generated when omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateGroupRequest {
    pub fn named(group_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::GroupStatus;

    #[test]
    fn lifecycle_only_moves_forward() {
        assert!(GroupStatus::Active.can_transition_to(GroupStatus::DeletePending));
        assert!(GroupStatus::DeletePending.can_transition_to(GroupStatus::Deleted));
        assert!(!GroupStatus::Active.can_transition_to(GroupStatus::Deleted));
        assert!(!GroupStatus::DeletePending.can_transition_to(GroupStatus::Active));
        assert!(!GroupStatus::Deleted.can_transition_to(GroupStatus::Active));
        assert!(!GroupStatus::Deleted.can_transition_to(GroupStatus::DeletePending));
    }

    #[test]
    fn status_parses_snake_case() {
        assert_eq!(
            "delete_pending".parse::<GroupStatus>(),
            Ok(GroupStatus::DeletePending)
        );
        assert!("archived".parse::<GroupStatus>().is_err());
    }
}
