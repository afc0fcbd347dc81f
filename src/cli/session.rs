use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use gatekeeper_core_types::IdentityPermission;
use gatekeeper_group_registry::{CreateGroupRequest, GroupManagement, InMemoryGroupRegistry};
use gatekeeper_permissions_broker::{
    AuthorizationService, CreateIdentityPermissionsRequest, DynamicPermissionsSource,
    InMemoryIdentityPermissionStore, PermissionsSource, StaticPermissionsSource,
};
use gatekeeper_policy_center::PolicyFile;
use serde::Deserialize;
use tracing::{info, warn};

/// Seed data for a scratch dynamic session: groups with their members and
/// the identity permissions to store.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantsFile {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub identity_permissions: Vec<IdentityPermission>,
}

pub fn load_grants_file(path: &Path) -> Result<GrantsFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grants from {}", path.display()))?;
    match serde_json::from_str(&raw) {
        Ok(grants) => Ok(grants),
        Err(json_err) => serde_yaml::from_str(&raw).with_context(|| {
            format!(
                "Failed to parse grants from {} (json error: {json_err})",
                path.display()
            )
        }),
    }
}

/// Static strategy unless grants are supplied, in which case an in-memory
/// dynamic session is seeded from them.
pub async fn build_service(
    policy: &PolicyFile,
    grants: Option<&Path>,
) -> Result<AuthorizationService> {
    let source: Arc<dyn PermissionsSource> = match grants {
        None => Arc::new(StaticPermissionsSource::new(policy)?),
        Some(path) => Arc::new(seed_dynamic_source(policy, load_grants_file(path)?).await?),
    };
    Ok(AuthorizationService::new(source))
}

async fn seed_dynamic_source(
    policy: &PolicyFile,
    grants: GrantsFile,
) -> Result<DynamicPermissionsSource> {
    let groups = Arc::new(InMemoryGroupRegistry::new());
    for (group_id, members) in &grants.groups {
        groups
            .create_group(CreateGroupRequest::named(group_id.as_str()))
            .await?;
        for member in members {
            GroupManagement::add_user_to_group(groups.as_ref(), member, group_id).await?;
        }
    }

    let source = DynamicPermissionsSource::new(
        Arc::new(InMemoryIdentityPermissionStore::new()),
        groups,
        policy,
    )?;
    let total = grants.identity_permissions.len();
    if total > 0 {
        let response = source
            .create_identity_permissions(CreateIdentityPermissionsRequest {
                identity_permissions: grants.identity_permissions,
            })
            .await?;
        if !response.created {
            warn!(
                unprocessed = response.unprocessed_identity_permissions.len(),
                "some grants were not stored"
            );
        }
    }
    info!(
        groups = grants.groups.len(),
        identity_permissions = total,
        "dynamic session seeded"
    );
    Ok(source)
}
