use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_core_types::{HttpMethod, Identity, Operation};
use gatekeeper_decision_engine::{explain, is_authorized, OperationDecision};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::AuthzError;
use crate::source::{cancellable, PermissionsSource};

/// Inbound authorization contract.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized_on_route(
        &self,
        identity: &Identity,
        route: &str,
        method: HttpMethod,
    ) -> Result<(), AuthzError>;

    async fn is_authorized_on_subject(
        &self,
        identity: &Identity,
        operations: &[Operation],
    ) -> Result<(), AuthzError>;
}

/// Glues a [`PermissionsSource`] to the decision engine.
///
/// Holds no state of its own: no caching, no mutation.
#[derive(Clone)]
pub struct AuthorizationService {
    source: Arc<dyn PermissionsSource>,
}

impl AuthorizationService {
    pub fn new(source: Arc<dyn PermissionsSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn PermissionsSource> {
        &self.source
    }

    pub async fn is_authorized_on_route_cancellable(
        &self,
        identity: &Identity,
        route: &str,
        method: HttpMethod,
        token: &CancellationToken,
    ) -> Result<(), AuthzError> {
        let operations =
            cancellable(token, self.source.get_operations_by_route(route, method)).await?;
        if operations.is_empty() {
            debug!(
                target = "gatekeeper::authz",
                user = %identity.id,
                %route,
                %method,
                "no operations required"
            );
            return Ok(());
        }
        self.decide(identity, &operations, token).await
    }

    pub async fn is_authorized_on_subject_cancellable(
        &self,
        identity: &Identity,
        operations: &[Operation],
        token: &CancellationToken,
    ) -> Result<(), AuthzError> {
        if operations.is_empty() {
            return Ok(());
        }
        self.decide(identity, operations, token).await
    }

    /// Per-operation outcomes for diagnostics; never fails on denial.
    pub async fn explain_on_subject(
        &self,
        identity: &Identity,
        operations: &[Operation],
    ) -> Result<Vec<(Operation, OperationDecision)>, AuthzError> {
        let permissions = self.source.get_permissions_by_user(identity).await?;
        Ok(explain(&permissions, operations))
    }

    pub async fn explain_on_route(
        &self,
        identity: &Identity,
        route: &str,
        method: HttpMethod,
    ) -> Result<Vec<(Operation, OperationDecision)>, AuthzError> {
        let operations = self.source.get_operations_by_route(route, method).await?;
        self.explain_on_subject(identity, &operations).await
    }

    async fn decide(
        &self,
        identity: &Identity,
        operations: &[Operation],
        token: &CancellationToken,
    ) -> Result<(), AuthzError> {
        let permissions = cancellable(token, self.source.get_permissions_by_user(identity)).await?;
        match is_authorized(&permissions, operations) {
            Ok(()) => {
                debug!(
                    target = "gatekeeper::authz",
                    user = %identity.id,
                    operations = operations.len(),
                    "authorized"
                );
                Ok(())
            }
            Err(forbidden) => {
                info!(
                    target = "gatekeeper::authz",
                    user = %identity.id,
                    operation = %forbidden.operation,
                    reason = %forbidden.reason,
                    "forbidden"
                );
                Err(AuthzError::Forbidden {
                    reason: forbidden.reason,
                })
            }
        }
    }
}

#[async_trait]
impl Authorizer for AuthorizationService {
    async fn is_authorized_on_route(
        &self,
        identity: &Identity,
        route: &str,
        method: HttpMethod,
    ) -> Result<(), AuthzError> {
        self.is_authorized_on_route_cancellable(identity, route, method, &CancellationToken::new())
            .await
    }

    async fn is_authorized_on_subject(
        &self,
        identity: &Identity,
        operations: &[Operation],
    ) -> Result<(), AuthzError> {
        self.is_authorized_on_subject_cancellable(identity, operations, &CancellationToken::new())
            .await
    }
}
