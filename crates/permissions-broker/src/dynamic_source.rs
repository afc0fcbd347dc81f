//! Data-driven permissions backed by an [`IdentityPermissionStore`].
//!
//! A user's permissions are the records stored for the user plus the records
//! stored for every group the user belongs to. Bulk writes are chunked to the
//! smaller of the configured batch size and the store limit, and whatever a
//! chunk could not write is handed back to the caller instead of being
//! dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_core_types::{
    Action, HttpMethod, Identity, IdentityPermission, IdentityPermissionKey, IdentityType,
    Operation, Permission,
};
use gatekeeper_group_registry::{GroupError, GroupMembership, GroupStatus};
use gatekeeper_policy_center::{
    validate_policy, ConfigError, DynamicSettings, OperationTemplate, PolicyFile,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::SourceError;
use crate::source::{push_unique, PermissionsSource, RouteResolution, RouteResolver};
use crate::store::IdentityPermissionStore;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityPermissionsRequest {
    pub identity_permissions: Vec<IdentityPermission>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityPermissionsResponse {
    /// `true` when every record was written.
    pub created: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unprocessed_identity_permissions: Vec<IdentityPermission>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteIdentityPermissionsRequest {
    pub identity_permissions: Vec<IdentityPermission>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteIdentityPermissionsResponse {
    /// `true` when at least one stored record was removed.
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unprocessed_keys: Vec<IdentityPermissionKey>,
}

/// Administrative listing of the records attached to one resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPermissionsQuery {
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default)]
    pub action: Option<Action>,
    /// Restricts the listing to these identities when set.
    #[serde(default)]
    pub identities: Option<Vec<IdentityRef>>,
}

impl SubjectPermissionsQuery {
    pub fn new(subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            action: None,
            identities: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_identities(mut self, identities: impl IntoIterator<Item = IdentityRef>) -> Self {
        self.identities = Some(identities.into_iter().collect());
        self
    }

    fn accepts(&self, record: &IdentityPermission) -> bool {
        if record.subject_type != self.subject_type || record.subject_id != self.subject_id {
            return false;
        }
        if let Some(action) = self.action {
            if record.action != action {
                return false;
            }
        }
        match &self.identities {
            Some(identities) => identities.iter().any(|identity| {
                identity.identity_type == record.identity_type
                    && identity.identity_id == record.identity_id
            }),
            None => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub identity_type: IdentityType,
    pub identity_id: String,
}

impl IdentityRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            identity_type: IdentityType::User,
            identity_id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            identity_type: IdentityType::Group,
            identity_id: id.into(),
        }
    }
}

pub struct DynamicPermissionsSource {
    store: Arc<dyn IdentityPermissionStore>,
    groups: Arc<dyn GroupMembership>,
    routes: RouteResolver<Vec<OperationTemplate>>,
    settings: DynamicSettings,
}

impl DynamicPermissionsSource {
    pub fn new(
        store: Arc<dyn IdentityPermissionStore>,
        groups: Arc<dyn GroupMembership>,
        policy: &PolicyFile,
    ) -> Result<Self, ConfigError> {
        validate_policy(policy)?;
        Ok(Self {
            store,
            groups,
            routes: RouteResolver::build(&policy.dynamic_routes, &policy.routes_ignored)?,
            settings: policy.settings.dynamic.clone(),
        })
    }

    pub fn settings(&self) -> &DynamicSettings {
        &self.settings
    }

    fn chunk_size(&self) -> usize {
        self.settings
            .batch_size
            .min(self.store.max_batch_size())
            .max(1)
    }

    pub async fn create_identity_permissions(
        &self,
        request: CreateIdentityPermissionsRequest,
    ) -> Result<CreateIdentityPermissionsResponse, SourceError> {
        if request.identity_permissions.is_empty() {
            return Err(SourceError::InvalidRequest(
                "no identity permissions supplied".into(),
            ));
        }

        let mut records: BTreeMap<IdentityPermissionKey, IdentityPermission> = BTreeMap::new();
        for record in request.identity_permissions {
            validate_record(&record)?;
            let key = record.key();
            match records.get(&key) {
                Some(seen) if *seen == record => {}
                Some(_) => {
                    return Err(SourceError::InvalidRequest(format!(
                        "conflicting duplicates for {key}"
                    )))
                }
                None => {
                    records.insert(key, record);
                }
            }
        }

        let groups: BTreeSet<&str> = records
            .values()
            .filter(|record| record.identity_type == IdentityType::Group)
            .map(|record| record.identity_id.as_str())
            .collect();
        for group in groups {
            self.ensure_group_active(group).await?;
        }

        let records = self.skip_stored(records).await?;
        let total = records.len();
        let mut unprocessed = Vec::new();
        for chunk in records.chunks(self.chunk_size()) {
            match self.store.batch_put(chunk.to_vec()).await {
                Ok(outcome) => unprocessed.extend(outcome.unprocessed),
                Err(err) => {
                    warn!(
                        target = "gatekeeper::dynamic",
                        error = %err,
                        records = chunk.len(),
                        "batch put failed"
                    );
                    unprocessed.extend_from_slice(chunk);
                }
            }
        }

        if unprocessed.is_empty() {
            info!(target = "gatekeeper::dynamic", records = total, "identity permissions created");
        } else {
            warn!(
                target = "gatekeeper::dynamic",
                records = total,
                unprocessed = unprocessed.len(),
                "identity permissions partially created"
            );
        }
        Ok(CreateIdentityPermissionsResponse {
            created: unprocessed.is_empty(),
            unprocessed_identity_permissions: unprocessed,
        })
    }

    /// New GROUP records are only accepted for `active` groups.
    async fn ensure_group_active(&self, group_id: &str) -> Result<(), SourceError> {
        match self.groups.get_group_status(group_id).await {
            Ok(GroupStatus::Active) => Ok(()),
            Ok(status) => Err(SourceError::Group(GroupError::NotActive {
                group_id: group_id.to_string(),
                status,
            })),
            Err(GroupError::NotFound(_)) => Err(SourceError::GroupNotFound(group_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Drops records that are already stored unchanged, rejects ones that
    /// would rewrite a stored record, and enforces the per-identity limit on
    /// what is left.
    async fn skip_stored(
        &self,
        records: BTreeMap<IdentityPermissionKey, IdentityPermission>,
    ) -> Result<Vec<IdentityPermission>, SourceError> {
        let limit = self.settings.max_permissions_per_identity;
        let mut by_partition: BTreeMap<String, Vec<(IdentityPermissionKey, IdentityPermission)>> =
            BTreeMap::new();
        for (key, record) in records {
            by_partition
                .entry(key.partition.clone())
                .or_default()
                .push((key, record));
        }

        let mut fresh = Vec::new();
        for (partition, entries) in by_partition {
            let Some((_, sample)) = entries.first() else {
                continue;
            };
            let existing: BTreeMap<IdentityPermissionKey, IdentityPermission> = self
                .store
                .get_by_identity(sample.identity_type, &sample.identity_id)
                .await?
                .into_iter()
                .map(|record| (record.key(), record))
                .collect();

            let mut added = 0usize;
            for (key, record) in entries {
                match existing.get(&key) {
                    Some(stored) if *stored == record => {
                        debug!(target = "gatekeeper::dynamic", %key, "already stored");
                    }
                    Some(_) => return Err(SourceError::AlreadyExists(key)),
                    None => {
                        added += 1;
                        fresh.push(record);
                    }
                }
            }
            if existing.len() + added > limit {
                return Err(SourceError::TooManyRequests { identity: partition, limit });
            }
        }
        Ok(fresh)
    }

    /// Deletes by exact key. Records that do not exist are ignored.
    pub async fn delete_identity_permissions(
        &self,
        request: DeleteIdentityPermissionsRequest,
    ) -> Result<DeleteIdentityPermissionsResponse, SourceError> {
        let keys: BTreeSet<IdentityPermissionKey> = request
            .identity_permissions
            .iter()
            .map(IdentityPermission::key)
            .collect();
        self.delete_keys(keys.into_iter().collect()).await
    }

    pub async fn get_identity_permissions_by_identity(
        &self,
        identity_type: IdentityType,
        identity_id: &str,
    ) -> Result<Vec<IdentityPermission>, SourceError> {
        Ok(self.store.get_by_identity(identity_type, identity_id).await?)
    }

    pub async fn get_identity_permissions_by_subject(
        &self,
        query: &SubjectPermissionsQuery,
    ) -> Result<Vec<IdentityPermission>, SourceError> {
        let records = self.store.list_by_subject_type(&query.subject_type).await?;
        Ok(records
            .into_iter()
            .filter(|record| query.accepts(record))
            .collect())
    }

    /// Removes every record attached to one resource instance.
    pub async fn delete_subject_identity_permissions(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<DeleteIdentityPermissionsResponse, SourceError> {
        let query = SubjectPermissionsQuery::new(subject_type, subject_id);
        let keys = self
            .get_identity_permissions_by_subject(&query)
            .await?
            .iter()
            .map(IdentityPermission::key)
            .collect();
        self.delete_keys(keys).await
    }

    async fn delete_keys(
        &self,
        keys: Vec<IdentityPermissionKey>,
    ) -> Result<DeleteIdentityPermissionsResponse, SourceError> {
        let mut removed = 0usize;
        let mut unprocessed = Vec::new();
        for chunk in keys.chunks(self.chunk_size()) {
            match self.store.batch_delete(chunk.to_vec()).await {
                Ok(outcome) => {
                    removed += outcome.removed.len();
                    unprocessed.extend(outcome.unprocessed);
                }
                Err(err) => {
                    warn!(
                        target = "gatekeeper::dynamic",
                        error = %err,
                        keys = chunk.len(),
                        "batch delete failed"
                    );
                    unprocessed.extend_from_slice(chunk);
                }
            }
        }
        info!(
            target = "gatekeeper::dynamic",
            requested = keys.len(),
            removed,
            unprocessed = unprocessed.len(),
            "identity permissions deleted"
        );
        Ok(DeleteIdentityPermissionsResponse {
            deleted: removed > 0,
            unprocessed_keys: unprocessed,
        })
    }
}

fn validate_record(record: &IdentityPermission) -> Result<(), SourceError> {
    let invalid =
        |detail: &str| SourceError::InvalidRequest(format!("{detail} in {}", record.key()));
    if record.identity_id.trim().is_empty() {
        return Err(invalid("empty identity id"));
    }
    if record.subject_type.trim().is_empty() || record.subject_type.contains('|') {
        return Err(invalid("invalid subject type"));
    }
    if record.subject_id.trim().is_empty() {
        return Err(invalid("empty subject id"));
    }
    if matches!(&record.fields, Some(fields) if fields.is_empty()) {
        return Err(invalid("empty field list"));
    }
    Ok(())
}

#[async_trait]
impl PermissionsSource for DynamicPermissionsSource {
    async fn get_operations_by_route(
        &self,
        route: &str,
        method: HttpMethod,
    ) -> Result<Vec<Operation>, SourceError> {
        let found = match self.routes.resolve(route, method)? {
            RouteResolution::Ignored => return Ok(Vec::new()),
            RouteResolution::Secured(found) => found,
        };
        found
            .value
            .iter()
            .map(|template| {
                template.resolve(&found.params).ok_or_else(|| {
                    SourceError::InvalidRequest(format!(
                        "route {} lacks parameter for {}",
                        found.route, template.subject_type
                    ))
                })
            })
            .collect()
    }

    async fn get_permissions_by_user(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Permission>, SourceError> {
        let mut groups: BTreeSet<String> = self
            .groups
            .get_user_groups(&identity.id)
            .await?
            .into_iter()
            .collect();
        groups.extend(identity.roles.iter().cloned());

        let mut permissions = Vec::new();
        let user_records = self
            .store
            .get_by_identity(IdentityType::User, &identity.id)
            .await?;
        for record in &user_records {
            push_unique(&mut permissions, record.to_permission());
        }
        for group in &groups {
            let records = self.store.get_by_identity(IdentityType::Group, group).await?;
            for record in &records {
                push_unique(&mut permissions, record.to_permission());
            }
        }
        debug!(
            target = "gatekeeper::dynamic",
            user = %identity.id,
            groups = groups.len(),
            permissions = permissions.len(),
            "resolved identity permissions"
        );
        Ok(permissions)
    }
}
