use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use gatekeeper_core_types::{IdentityPermission, IdentityPermissionKey, IdentityType};

use crate::store::{BatchDeleteOutcome, BatchWriteOutcome, IdentityPermissionStore, StoreError};

/// Default batch limit, matching common document-store write batches.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 25;

/// In-memory store keyed by partition then sort key.
pub struct InMemoryIdentityPermissionStore {
    partitions: DashMap<String, BTreeMap<String, IdentityPermission>>,
    max_batch_size: usize,
}

impl Default for InMemoryIdentityPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityPermissionStore {
    pub fn new() -> Self {
        Self::with_max_batch_size(DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_batch(&self, size: usize) -> Result<(), StoreError> {
        if size > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size,
                limit: self.max_batch_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityPermissionStore for InMemoryIdentityPermissionStore {
    async fn get_by_identity(
        &self,
        identity_type: IdentityType,
        identity_id: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError> {
        let partition = IdentityPermissionKey::partition_for(identity_type, identity_id);
        Ok(self
            .partitions
            .get(&partition)
            .map(|entry| entry.value().values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_by_subject_type(
        &self,
        subject_type: &str,
    ) -> Result<Vec<IdentityPermission>, StoreError> {
        let mut records: Vec<IdentityPermission> = self
            .partitions
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .values()
                    .filter(|record| record.subject_type == subject_type)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        records.sort_by_key(|record| record.key());
        Ok(records)
    }

    async fn batch_put(
        &self,
        records: Vec<IdentityPermission>,
    ) -> Result<BatchWriteOutcome, StoreError> {
        self.check_batch(records.len())?;
        let mut outcome = BatchWriteOutcome::default();
        for record in records {
            let key = record.key();
            self.partitions
                .entry(key.partition)
                .or_default()
                .entry(key.sort)
                .or_insert_with(|| record.clone());
            outcome.written.push(record);
        }
        Ok(outcome)
    }

    async fn batch_delete(
        &self,
        keys: Vec<IdentityPermissionKey>,
    ) -> Result<BatchDeleteOutcome, StoreError> {
        self.check_batch(keys.len())?;
        let mut outcome = BatchDeleteOutcome::default();
        for key in keys {
            let removed = self
                .partitions
                .get_mut(&key.partition)
                .and_then(|mut partition| partition.remove(&key.sort));
            if let Some(record) = removed {
                outcome.removed.push(record);
            }
        }
        self.partitions.retain(|_, partition| !partition.is_empty());
        Ok(outcome)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
