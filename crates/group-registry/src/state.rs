use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    api::GroupManagement,
    errors::GroupError,
    model::{CreateGroupRequest, Group, GroupStatus},
};

struct GroupEntry {
    group: Group,
    members: BTreeSet<String>,
}

/// In-memory group registry.
///
/// Each group and its membership live under a single map entry so status
/// checks and membership changes for one group are atomic.
#[derive(Default)]
pub struct InMemoryGroupRegistry {
    groups: DashMap<String, GroupEntry>,
}

impl InMemoryGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, group_id: &str) -> Option<Group> {
        self.groups.get(group_id).map(|entry| entry.group.clone())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn require_id(value: &str, what: &str) -> Result<(), GroupError> {
    if value.trim().is_empty() {
        return Err(GroupError::InvalidRequest(format!("{what} must not be empty")));
    }
    Ok(())
}

#[async_trait]
impl GroupManagement for InMemoryGroupRegistry {
    async fn create_group(&self, request: CreateGroupRequest) -> Result<Group, GroupError> {
        let group_id = request
            .group_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        require_id(&group_id, "group id")?;

        match self.groups.entry(group_id.clone()) {
            Entry::Occupied(_) => Err(GroupError::AlreadyExists(group_id)),
            Entry::Vacant(slot) => {
                let group = Group {
                    id: group_id,
                    description: request.description,
                    status: GroupStatus::Active,
                };
                slot.insert(GroupEntry {
                    group: group.clone(),
                    members: BTreeSet::new(),
                });
                info!(target = "gatekeeper::groups", group = %group.id, "group created");
                Ok(group)
            }
        }
    }

    async fn delete_group(&self, group_id: &str) -> Result<Group, GroupError> {
        match self.groups.entry(group_id.to_string()) {
            Entry::Vacant(_) => Err(GroupError::NotFound(group_id.to_string())),
            Entry::Occupied(slot) => {
                let entry = slot.get();
                if entry.group.status != GroupStatus::Deleted {
                    return Err(GroupError::NotDeleted {
                        group_id: group_id.to_string(),
                        status: entry.group.status,
                    });
                }
                if !entry.members.is_empty() {
                    return Err(GroupError::NotEmpty {
                        group_id: group_id.to_string(),
                        members: entry.members.len(),
                    });
                }
                let (_, removed) = slot.remove_entry();
                info!(target = "gatekeeper::groups", group = %group_id, "group removed");
                Ok(removed.group)
            }
        }
    }

    async fn add_user_to_group(&self, user_id: &str, group_id: &str) -> Result<(), GroupError> {
        require_id(user_id, "user id")?;
        let mut entry = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        if entry.group.status != GroupStatus::Active {
            return Err(GroupError::NotActive {
                group_id: group_id.to_string(),
                status: entry.group.status,
            });
        }
        if entry.members.insert(user_id.to_string()) {
            debug!(target = "gatekeeper::groups", user = %user_id, group = %group_id, "member added");
        }
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<(), GroupError> {
        let mut entry = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        if entry.members.remove(user_id) {
            debug!(target = "gatekeeper::groups", user = %user_id, group = %group_id, "member removed");
        }
        Ok(())
    }

    async fn is_user_assigned_to_group(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<bool, GroupError> {
        let entry = self
            .groups
            .get(group_id)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        Ok(entry.members.contains(user_id))
    }

    async fn get_group_users(&self, group_id: &str) -> Result<Vec<String>, GroupError> {
        let entry = self
            .groups
            .get(group_id)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        Ok(entry.members.iter().cloned().collect())
    }

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>, GroupError> {
        let mut groups: Vec<String> = self
            .groups
            .iter()
            .filter(|entry| entry.members.contains(user_id))
            .map(|entry| entry.key().clone())
            .collect();
        groups.sort();
        Ok(groups)
    }

    async fn does_group_exist(&self, group_id: &str) -> Result<bool, GroupError> {
        Ok(self.groups.contains_key(group_id))
    }

    async fn get_group_status(&self, group_id: &str) -> Result<GroupStatus, GroupError> {
        self.groups
            .get(group_id)
            .map(|entry| entry.group.status)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))
    }

    async fn set_group_status(
        &self,
        group_id: &str,
        status: GroupStatus,
    ) -> Result<GroupStatus, GroupError> {
        let mut entry = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| GroupError::NotFound(group_id.to_string()))?;
        let previous = entry.group.status;
        if !previous.can_transition_to(status) {
            return Err(GroupError::InvalidTransition {
                group_id: group_id.to_string(),
                from: previous,
                to: status,
            });
        }
        entry.group.status = status;
        if previous != status {
            info!(
                target = "gatekeeper::groups",
                group = %group_id,
                from = %previous,
                to = %status,
                "group status changed"
            );
        }
        Ok(previous)
    }
}
