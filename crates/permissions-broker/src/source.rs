use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use gatekeeper_core_types::{HttpMethod, Identity, Operation, Permission};
use gatekeeper_policy_center::{ConfigError, RouteMatch, RouteTable, RoutesIgnored};
use tokio_util::sync::CancellationToken;

use crate::errors::SourceError;

/// Resolves routes and identities into operations and permissions.
///
/// Implementations are chosen at composition time and shared behind an
/// `Arc<dyn PermissionsSource>`.
#[async_trait]
pub trait PermissionsSource: Send + Sync {
    /// Operations a route requires. An ignored route yields an empty list; a
    /// route in neither table is [`SourceError::RouteNotSecured`].
    async fn get_operations_by_route(
        &self,
        route: &str,
        method: HttpMethod,
    ) -> Result<Vec<Operation>, SourceError>;

    async fn get_permissions_by_user(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Permission>, SourceError>;
}

/// Runs `fut` unless `token` fires first.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SourceError::Cancelled),
        result = fut => result,
    }
}

pub(crate) enum RouteResolution<'a, T> {
    Ignored,
    Secured(RouteMatch<'a, T>),
}

/// Secured and ignored route tables of one source.
#[derive(Clone, Debug)]
pub(crate) struct RouteResolver<T> {
    secured: RouteTable<T>,
    ignored: RouteTable<()>,
}

impl<T: Clone> RouteResolver<T> {
    pub(crate) fn build(
        secured: &BTreeMap<String, BTreeMap<HttpMethod, T>>,
        ignored: &RoutesIgnored,
    ) -> Result<Self, ConfigError> {
        let ignored: BTreeMap<String, BTreeMap<HttpMethod, ()>> = ignored
            .iter()
            .map(|(route, methods)| {
                let enabled = methods
                    .iter()
                    .filter(|(_, ignored)| **ignored)
                    .map(|(method, _)| (*method, ()))
                    .collect();
                (route.clone(), enabled)
            })
            .collect();
        Ok(Self {
            secured: RouteTable::build(secured)?,
            ignored: RouteTable::build(&ignored)?,
        })
    }
}

impl<T> RouteResolver<T> {
    /// A secured match wins unless an ignored entry is strictly more specific.
    pub(crate) fn resolve(
        &self,
        route: &str,
        method: HttpMethod,
    ) -> Result<RouteResolution<'_, T>, SourceError> {
        let secured = self.secured.lookup(route, method);
        let ignored = self.ignored.lookup(route, method);
        match (secured, ignored) {
            (Some(secured), Some(ignored)) if ignored.specificity > secured.specificity => {
                Ok(RouteResolution::Ignored)
            }
            (Some(secured), _) => Ok(RouteResolution::Secured(secured)),
            (None, Some(_)) => Ok(RouteResolution::Ignored),
            (None, None) => Err(SourceError::RouteNotSecured {
                route: route.to_string(),
                method,
            }),
        }
    }
}

/// Order-preserving union.
pub(crate) fn push_unique(target: &mut Vec<Permission>, permission: Permission) {
    if !target.contains(&permission) {
        target.push(permission);
    }
}
