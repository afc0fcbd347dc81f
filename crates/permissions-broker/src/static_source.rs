use async_trait::async_trait;
use gatekeeper_core_types::{HttpMethod, Identity, Operation, Permission};
use gatekeeper_policy_center::{validate_policy, ConfigError, PermissionsMap, PolicyFile};
use tracing::debug;

use crate::errors::SourceError;
use crate::source::{push_unique, PermissionsSource, RouteResolution, RouteResolver};

/// Permissions fixed at deploy time: operations per route, permissions per
/// role. Tables are validated on construction and never change afterwards.
#[derive(Clone, Debug)]
pub struct StaticPermissionsSource {
    routes: RouteResolver<Vec<Operation>>,
    permissions: PermissionsMap,
}

impl StaticPermissionsSource {
    pub fn new(policy: &PolicyFile) -> Result<Self, ConfigError> {
        validate_policy(policy)?;
        Ok(Self {
            routes: RouteResolver::build(&policy.routes, &policy.routes_ignored)?,
            permissions: policy.permissions.clone(),
        })
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.permissions.keys().map(String::as_str)
    }
}

#[async_trait]
impl PermissionsSource for StaticPermissionsSource {
    async fn get_operations_by_route(
        &self,
        route: &str,
        method: HttpMethod,
    ) -> Result<Vec<Operation>, SourceError> {
        match self.routes.resolve(route, method)? {
            RouteResolution::Ignored => {
                debug!(target = "gatekeeper::static", %route, %method, "route ignored");
                Ok(Vec::new())
            }
            RouteResolution::Secured(found) => Ok(found.value.clone()),
        }
    }

    async fn get_permissions_by_user(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Permission>, SourceError> {
        let mut permissions = Vec::new();
        for role in &identity.roles {
            let Some(granted) = self.permissions.get(role) else {
                continue;
            };
            for permission in granted {
                push_unique(&mut permissions, permission.clone());
            }
        }
        Ok(permissions)
    }
}
