use std::collections::BTreeMap;

use gatekeeper_core_types::{Action, HttpMethod, Operation, Permission, Subject};
use serde::{Deserialize, Serialize};

/// `route -> method -> operations` for secured routes.
pub type RoutesMap = BTreeMap<String, BTreeMap<HttpMethod, Vec<Operation>>>;
/// `route -> method -> true` for routes that skip authorization.
pub type RoutesIgnored = BTreeMap<String, BTreeMap<HttpMethod, bool>>;
/// `role -> permissions` granted by the static strategy.
pub type PermissionsMap = BTreeMap<String, Vec<Permission>>;
/// `route -> method -> operation templates` for the dynamic strategy.
pub type DynamicRoutesMap = BTreeMap<String, BTreeMap<HttpMethod, Vec<OperationTemplate>>>;

/// Operation whose instance id is taken from a route parameter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OperationTemplate {
    pub action: Action,
    pub subject_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl OperationTemplate {
    pub fn new(action: Action, subject_type: impl Into<String>) -> Self {
        Self {
            action,
            subject_type: subject_type.into(),
            subject_id_param: None,
            field: None,
        }
    }

    pub fn with_subject_id_param(mut self, param: impl Into<String>) -> Self {
        self.subject_id_param = Some(param.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// `None` when the template names a parameter missing from `params`.
    pub fn resolve(&self, params: &BTreeMap<String, String>) -> Option<Operation> {
        let subject = match &self.subject_id_param {
            Some(param) => Subject::instance(&self.subject_type, params.get(param)?),
            None => Subject::new(&self.subject_type),
        };
        let mut operation = Operation::new(self.action, subject);
        operation.field = self.field.clone();
        Some(operation)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DynamicSettings {
    #[serde(default = "default_max_permissions_per_identity")]
    pub max_permissions_per_identity: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_max_permissions_per_identity() -> usize {
    100
}

fn default_batch_size() -> usize {
    25
}

impl Default for DynamicSettings {
    fn default() -> Self {
        Self {
            max_permissions_per_identity: default_max_permissions_per_identity(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub dynamic: DynamicSettings,
}

/// Policy definition file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub routes: RoutesMap,
    #[serde(default)]
    pub routes_ignored: RoutesIgnored,
    #[serde(default)]
    pub permissions: PermissionsMap,
    #[serde(default)]
    pub dynamic_routes: DynamicRoutesMap,
    #[serde(default)]
    pub settings: EngineSettings,
}

fn default_version() -> u32 {
    1
}

impl PolicyFile {
    /// Ignored routes with their `false` entries dropped.
    pub fn effective_ignored(&self) -> BTreeMap<String, BTreeMap<HttpMethod, ()>> {
        self.routes_ignored
            .iter()
            .filter_map(|(route, methods)| {
                let enabled: BTreeMap<HttpMethod, ()> = methods
                    .iter()
                    .filter(|(_, ignored)| **ignored)
                    .map(|(method, _)| (*method, ()))
                    .collect();
                (!enabled.is_empty()).then(|| (route.clone(), enabled))
            })
            .collect()
    }
}
