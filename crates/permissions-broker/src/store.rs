use async_trait::async_trait;
use gatekeeper_core_types::{IdentityPermission, IdentityPermissionKey, IdentityType};
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("batch of {size} exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Default)]
pub struct BatchWriteOutcome {
    pub written: Vec<IdentityPermission>,
    pub unprocessed: Vec<IdentityPermission>,
}

#[derive(Clone, Debug, Default)]
pub struct BatchDeleteOutcome {
    /// Records that existed and were removed.
    pub removed: Vec<IdentityPermission>,
    pub unprocessed: Vec<IdentityPermissionKey>,
}

/// Durable key-value store holding identity permissions.
///
/// Records are addressed by [`IdentityPermissionKey`]: point lookups go by
/// partition (`identityType#identityId`), listings by subject type are for
/// administrative use only. Batches may be partially applied; whatever could
/// not be written comes back as `unprocessed`.
#[async_trait]
pub trait IdentityPermissionStore: Send + Sync {
    async fn get_by_identity(
        &self,
        identity_type: IdentityType,
        identity_id: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError>;

    async fn list_by_subject_type(
        &self,
        subject_type: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError>;

    /// Records are immutable: a key that already exists keeps its stored
    /// record and the write is a no-op.
    async fn batch_put(
        &self,
        records: Vec<IdentityPermission>,
    ) -> Result<BatchWriteOutcome, StoreError>;

    /// Missing keys are skipped, not reported as failures.
    async fn batch_delete(
        &self,
        keys: Vec<IdentityPermissionKey>,
    ) -> Result<BatchDeleteOutcome, StoreError>;

    fn max_batch_size(&self) -> usize;
}
