use async_trait::async_trait;

use crate::errors::GroupError;
use crate::model::{CreateGroupRequest, Group, GroupStatus};

/// Administrative group operations.
///
/// Membership is owned here; permission sources only read it through
/// [`GroupMembership`].
#[async_trait]
pub trait GroupManagement: Send + Sync {
    async fn create_group(&self, request: CreateGroupRequest) -> Result<Group, GroupError>;
    /// Only a `deleted` group without members can be removed.
    async fn delete_group(&self, group_id: &str) -> Result<Group, GroupError>;
    /// Fails with [`GroupError::NotActive`] unless the group is `active`.
    async fn add_user_to_group(&self, user_id: &str, group_id: &str) -> Result<(), GroupError>;
    async fn remove_user_from_group(&self, user_id: &str, group_id: &str)
        -> Result<(), GroupError>;
    async fn is_user_assigned_to_group(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<bool, GroupError>;
    async fn get_group_users(&self, group_id: &str) -> Result<Vec<String>, GroupError>;
    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>, GroupError>;
    async fn does_group_exist(&self, group_id: &str) -> Result<bool, GroupError>;
    async fn get_group_status(&self, group_id: &str) -> Result<GroupStatus, GroupError>;
    async fn set_group_status(
        &self,
        group_id: &str,
        status: GroupStatus,
    ) -> Result<GroupStatus, GroupError>;
}

/// Read-only membership view consumed by the dynamic permission source.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>, GroupError>;
    async fn does_group_exist(&self, group_id: &str) -> Result<bool, GroupError>;
    async fn get_group_status(&self, group_id: &str) -> Result<GroupStatus, GroupError>;
}

#[async_trait]
impl<T> GroupMembership for T
where
    T: GroupManagement + ?Sized,
{
    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>, GroupError> {
        GroupManagement::get_user_groups(self, user_id).await
    }

    async fn does_group_exist(&self, group_id: &str) -> Result<bool, GroupError> {
        GroupManagement::does_group_exist(self, group_id).await
    }

    async fn get_group_status(&self, group_id: &str) -> Result<GroupStatus, GroupError> {
        GroupManagement::get_group_status(self, group_id).await
    }
}
