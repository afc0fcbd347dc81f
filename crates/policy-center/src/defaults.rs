use std::collections::BTreeMap;

use gatekeeper_core_types::{Action, HttpMethod, Operation, Permission};

use crate::model::{EngineSettings, OperationTemplate, PolicyFile};

/// Built-in policy used when no configuration file is found.
pub fn default_policy_file() -> PolicyFile {
    let mut policy = PolicyFile {
        version: 1,
        settings: EngineSettings::default(),
        ..Default::default()
    };

    policy.routes.insert(
        "/projects".into(),
        BTreeMap::from([
            (
                HttpMethod::Get,
                vec![Operation::new(Action::Read, "Project")],
            ),
            (
                HttpMethod::Post,
                vec![Operation::new(Action::Create, "Project")],
            ),
        ]),
    );
    policy.routes.insert(
        "/projects/:projectId".into(),
        BTreeMap::from([
            (
                HttpMethod::Get,
                vec![Operation::new(Action::Read, "Project")],
            ),
            (
                HttpMethod::Delete,
                vec![Operation::new(Action::Delete, "Project")],
            ),
        ]),
    );
    policy.routes_ignored.insert(
        "/health".into(),
        BTreeMap::from([(HttpMethod::Get, true)]),
    );

    policy
        .permissions
        .insert("admin".into(), vec![Permission::allow(Action::Any, "*")]);
    policy.permissions.insert(
        "researcher".into(),
        vec![
            Permission::allow(Action::Read, "Project"),
            Permission::allow(Action::Create, "Project"),
            Permission::deny(Action::Delete, "Project")
                .with_reason("Only administrators may delete projects"),
        ],
    );

    policy.dynamic_routes.insert(
        "/projects/:projectId".into(),
        BTreeMap::from([
            (
                HttpMethod::Get,
                vec![OperationTemplate::new(Action::Read, "Project")
                    .with_subject_id_param("projectId")],
            ),
            (
                HttpMethod::Put,
                vec![OperationTemplate::new(Action::Update, "Project")
                    .with_subject_id_param("projectId")],
            ),
        ]),
    );

    policy
}
