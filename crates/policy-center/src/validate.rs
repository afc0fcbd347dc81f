use std::collections::BTreeSet;

use tracing::info;

use crate::errors::ConfigError;
use crate::model::PolicyFile;
use crate::route::RouteTemplate;

/// Rejects configurations that would make route decisions ambiguous.
///
/// Runs once at load time; nothing here is re-checked per request.
pub fn validate_policy(policy: &PolicyFile) -> Result<(), ConfigError> {
    let mut ignored = BTreeSet::new();
    for route in policy.effective_ignored().keys() {
        ignored.insert(RouteTemplate::parse(route)?.shape());
    }

    for route in policy.routes.keys() {
        let template = RouteTemplate::parse(route)?;
        if ignored.contains(&template.shape()) {
            return Err(ConfigError::RouteMap {
                route: route.clone(),
            });
        }
    }

    for (route, methods) in &policy.dynamic_routes {
        let template = RouteTemplate::parse(route)?;
        if ignored.contains(&template.shape()) {
            return Err(ConfigError::RouteMap {
                route: route.clone(),
            });
        }
        for (method, operations) in methods {
            for operation in operations {
                let Some(param) = &operation.subject_id_param else {
                    continue;
                };
                if !template.has_param(param) {
                    return Err(ConfigError::InvalidRoute {
                        route: route.clone(),
                        detail: format!("{method} references unknown parameter `{param}`"),
                    });
                }
            }
        }
    }

    let dynamic = &policy.settings.dynamic;
    if dynamic.batch_size == 0 {
        return Err(ConfigError::InvalidValue(
            "dynamic.batch_size must be greater than zero".into(),
        ));
    }
    if dynamic.max_permissions_per_identity == 0 {
        return Err(ConfigError::InvalidValue(
            "dynamic.max_permissions_per_identity must be greater than zero".into(),
        ));
    }

    info!(
        target = "gatekeeper::policy",
        routes = policy.routes.len(),
        ignored = ignored.len(),
        dynamic_routes = policy.dynamic_routes.len(),
        roles = policy.permissions.len(),
        "policy validated"
    );
    Ok(())
}
