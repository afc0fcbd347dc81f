use gatekeeper_core_types::{Effect, Operation, Permission};
use tracing::debug;

use crate::errors::Forbidden;

/// Reason used when a DENY applies but carries no reason of its own.
pub const PERMISSION_NOT_GRANTED: &str = "Permission Not Granted";

/// Outcome of a single operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperationDecision {
    Allowed,
    /// An applicable DENY overrode any ALLOW.
    Denied { reason: String },
    /// Nothing applicable was found.
    NotGranted { reason: String },
}

impl OperationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, OperationDecision::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            OperationDecision::Allowed => None,
            OperationDecision::Denied { reason } | OperationDecision::NotGranted { reason } => {
                Some(reason)
            }
        }
    }
}

/// Permissions that apply to `operation`, in input order.
pub fn matching_permissions<'a>(
    permissions: &'a [Permission],
    operation: &'a Operation,
) -> impl Iterator<Item = &'a Permission> + 'a {
    permissions.iter().filter(move |permission| {
        permission.action.covers(operation.action)
            && permission.subject.matches(&operation.subject)
            && permission.covers_field(operation.field.as_deref())
    })
}

pub fn evaluate_operation(permissions: &[Permission], operation: &Operation) -> OperationDecision {
    let mut matched = false;
    let mut deny_reason: Option<&str> = None;
    let mut denied = false;

    for permission in matching_permissions(permissions, operation) {
        matched = true;
        if permission.effect == Effect::Deny {
            denied = true;
            // first reasoned DENY is reported
            if deny_reason.is_none() {
                deny_reason = permission.reason.as_deref();
            }
        }
    }

    if !matched {
        return OperationDecision::NotGranted {
            reason: format!(
                "Cannot execute \"{}\" on \"{}\"",
                operation.action, operation.subject
            ),
        };
    }

    if denied {
        return OperationDecision::Denied {
            reason: deny_reason.unwrap_or(PERMISSION_NOT_GRANTED).to_string(),
        };
    }

    OperationDecision::Allowed
}

/// Succeeds only when every operation is allowed; stops at the first
/// failing operation. An empty operation list is always authorized.
pub fn is_authorized(permissions: &[Permission], operations: &[Operation]) -> Result<(), Forbidden> {
    for operation in operations {
        match evaluate_operation(permissions, operation) {
            OperationDecision::Allowed => continue,
            OperationDecision::Denied { reason } | OperationDecision::NotGranted { reason } => {
                debug!(
                    target = "gatekeeper::engine",
                    operation = %operation,
                    %reason,
                    "operation rejected"
                );
                return Err(Forbidden::new(reason, operation.clone()));
            }
        }
    }
    Ok(())
}

/// Evaluates every operation without stopping at the first failure.
pub fn explain(
    permissions: &[Permission],
    operations: &[Operation],
) -> Vec<(Operation, OperationDecision)> {
    operations
        .iter()
        .map(|operation| (operation.clone(), evaluate_operation(permissions, operation)))
        .collect()
}
