use crate::defaults::default_policy_file;
use crate::errors::ConfigError;
use crate::loader::{load_policy, load_policy_from_path, parse_policy_str, LoadOptions, ENV_POLICY_PATH};
use crate::validate::validate_policy;
use gatekeeper_core_types::{Action, Effect, HttpMethod};
use std::env;
use std::sync::{Mutex, OnceLock};

const SAMPLE_YAML: &str = r#"version: 1
routes:
  /samples:
    GET:
      - action: READ
        subject: Sample
        field: id
      - action: READ
        subject: Sample
        field: name
  /samples/:sampleId:
    DELETE:
      - action: DELETE
        subject: Sample
routes_ignored:
  /health:
    GET: true
permissions:
  reader:
    - effect: ALLOW
      action: READ
      subject: Sample
      fields: [id, name]
  auditor:
    - effect: DENY
      action: DELETE
      subject: "*"
      reason: auditors are read-only
"#;

#[test]
fn default_policy_is_valid() {
    let policy = default_policy_file();
    validate_policy(&policy).expect("built-in policy validates");
    assert!(policy.permissions.contains_key("admin"));
}

#[test]
fn parses_yaml_policy() {
    let policy = parse_policy_str(SAMPLE_YAML).expect("parse yaml");
    validate_policy(&policy).expect("valid");
    let ops = &policy.routes["/samples"][&HttpMethod::Get];
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].field.as_deref(), Some("id"));
    assert_eq!(policy.permissions["auditor"][0].effect, Effect::Deny);
    assert_eq!(policy.settings.dynamic.batch_size, 25);
}

#[test]
fn parses_json_policy() {
    let raw = r#"{
        "routes": {"/users": {"POST": [{"action": "CREATE", "subject": "User"}]}},
        "permissions": {"admin": [{"effect": "ALLOW", "action": "MANAGE", "subject": "*"}]}
    }"#;
    let policy = parse_policy_str(raw).expect("parse json");
    assert_eq!(policy.version, 1);
    assert_eq!(policy.permissions["admin"][0].action, Action::Any);
}

#[test]
fn garbage_reports_both_parsers() {
    let err = parse_policy_str("routes: [unterminated").unwrap_err();
    match err {
        ConfigError::Deserialize(message) => {
            assert!(message.contains("json error"));
            assert!(message.contains("yaml error"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn route_in_both_maps_is_rejected() {
    let mut policy = parse_policy_str(SAMPLE_YAML).unwrap();
    policy
        .routes_ignored
        .entry("/samples/".into())
        .or_default()
        .insert(HttpMethod::Get, true);
    let err = validate_policy(&policy).unwrap_err();
    assert!(matches!(err, ConfigError::RouteMap { .. }));
}

#[test]
fn templates_differing_only_in_param_names_conflict() {
    let mut policy = parse_policy_str(SAMPLE_YAML).unwrap();
    policy
        .routes_ignored
        .entry("/samples/:id".into())
        .or_default()
        .insert(HttpMethod::Get, true);
    let err = validate_policy(&policy).unwrap_err();
    assert!(matches!(err, ConfigError::RouteMap { ref route } if route == "/samples/:sampleId"));
}

#[test]
fn disabled_ignore_entry_does_not_conflict() {
    let mut policy = parse_policy_str(SAMPLE_YAML).unwrap();
    policy
        .routes_ignored
        .entry("/samples".into())
        .or_default()
        .insert(HttpMethod::Get, false);
    validate_policy(&policy).expect("false entries are not ignored routes");
}

#[test]
fn dynamic_route_must_declare_referenced_param() {
    let raw = r#"
dynamic_routes:
  /projects/:projectId:
    GET:
      - action: READ
        subject_type: Project
        subject_id_param: id
"#;
    let policy = parse_policy_str(raw).unwrap();
    let err = validate_policy(&policy).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRoute { .. }));
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut policy = default_policy_file();
    policy.settings.dynamic.batch_size = 0;
    assert!(matches!(
        validate_policy(&policy),
        Err(ConfigError::InvalidValue(_))
    ));
}

#[test]
fn load_from_path_validates() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("gatekeeper.yaml");
    std::fs::write(
        &file_path,
        "routes:\n  /a:\n    GET: []\nroutes_ignored:\n  /a:\n    POST: true\n",
    )
    .unwrap();
    let err = load_policy_from_path(&file_path).unwrap_err();
    assert!(matches!(err, ConfigError::RouteMap { .. }));
}

#[test]
fn missing_files_fall_back_to_builtin() {
    let options = LoadOptions {
        paths: vec!["/definitely/not/here.yaml".into()],
        include_env: false,
        include_path_env: false,
        include_default_paths: false,
    };
    let policy = load_policy(&options).expect("fallback");
    assert!(policy.routes.contains_key("/projects"));
}

#[test]
fn env_override_updates_settings() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("policy.yaml");
    std::fs::write(&file_path, SAMPLE_YAML).unwrap();

    let key = "GATEKEEPER__DYNAMIC__BATCH_SIZE";
    env::set_var(key, "10");
    let result = load_policy(&LoadOptions::with_path(&file_path));
    env::remove_var(key);

    let policy = result.expect("load with override");
    assert_eq!(policy.settings.dynamic.batch_size, 10);
    assert!(policy.routes.contains_key("/samples"));
}

#[test]
fn unknown_env_override_fails_fast() {
    let _guard = env_guard().lock().unwrap();
    let key = "GATEKEEPER__DYNAMIC__CACHE_TTL";
    env::set_var(key, "5");
    let result = load_policy(&LoadOptions {
        include_env: true,
        ..Default::default()
    });
    env::remove_var(key);
    assert!(matches!(result, Err(ConfigError::UnsupportedOverride(_))));
}

#[test]
fn policy_path_env_takes_precedence() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env.yaml");
    let explicit = dir.path().join("explicit.yaml");
    std::fs::write(&from_env, SAMPLE_YAML).unwrap();
    std::fs::write(&explicit, "permissions:\n  other: []\n").unwrap();

    env::set_var(ENV_POLICY_PATH, &from_env);
    let result = load_policy(&LoadOptions::with_path(&explicit));
    env::remove_var(ENV_POLICY_PATH);

    let policy = result.expect("load");
    assert!(policy.permissions.contains_key("reader"));
    assert!(!policy.permissions.contains_key("other"));
}

#[test]
fn exact_load_ignores_policy_path_env() {
    let _guard = env_guard().lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env.yaml");
    let explicit = dir.path().join("explicit.yaml");
    std::fs::write(&from_env, SAMPLE_YAML).unwrap();
    std::fs::write(&explicit, "permissions:\n  other: []\n").unwrap();

    env::set_var(ENV_POLICY_PATH, &from_env);
    let result = load_policy(&LoadOptions::exact(&explicit));
    env::remove_var(ENV_POLICY_PATH);

    let policy = result.expect("load");
    assert!(policy.permissions.contains_key("other"));
    assert!(!policy.permissions.contains_key("reader"));
}

fn env_guard() -> &'static Mutex<()> {
    static ENV_GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_GUARD.get_or_init(|| Mutex::new(()))
}
