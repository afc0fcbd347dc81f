use std::env;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::defaults::default_policy_file;
use crate::errors::ConfigError;
use crate::model::PolicyFile;
use crate::validate::validate_policy;

pub const ENV_POLICY_PATH: &str = "GATEKEEPER_POLICY_PATH";
const ENV_PREFIX: &str = "GATEKEEPER__";
const DEFAULT_POLICY_PATHS: &[&str] = &["config/gatekeeper.yaml", "config/gatekeeper.json"];

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    /// Applies `GATEKEEPER__` setting overrides.
    pub include_env: bool,
    /// Lets `GATEKEEPER_POLICY_PATH` replace `paths`.
    pub include_path_env: bool,
    pub include_default_paths: bool,
}

impl LoadOptions {
    /// Search-style loading: `GATEKEEPER_POLICY_PATH` wins over `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            include_path_env: true,
            include_default_paths: false,
        }
    }

    /// Loads exactly `path`; only setting overrides come from the environment.
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            include_path_env: false,
            include_default_paths: false,
        }
    }
}

pub fn parse_policy_str(raw: &str) -> Result<PolicyFile, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(policy) => Ok(policy),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|yaml_err| {
            ConfigError::Deserialize(format!(
                "json error: {}; yaml error: {}",
                json_err, yaml_err
            ))
        }),
    }
}

pub fn load_policy_from_reader<R: Read>(mut reader: R) -> Result<PolicyFile, ConfigError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    parse_policy_str(&buf)
}

/// Reads and validates a single policy file, without env overrides.
pub fn load_policy_from_path(path: impl AsRef<Path>) -> Result<PolicyFile, ConfigError> {
    let file = File::open(path.as_ref())?;
    let policy = load_policy_from_reader(file)?;
    validate_policy(&policy)?;
    Ok(policy)
}

/// Resolution order: `GATEKEEPER_POLICY_PATH` (when enabled), explicit paths, default
/// relative paths, built-in defaults. Env overrides are applied last and the
/// result is validated before it is returned.
pub fn load_policy(options: &LoadOptions) -> Result<PolicyFile, ConfigError> {
    let mut policy = None;

    if options.include_path_env {
        if let Ok(path) = env::var(ENV_POLICY_PATH) {
            policy = read_if_present(Path::new(&path))?;
        }
    }

    if policy.is_none() {
        for path in &options.paths {
            policy = read_if_present(path)?;
            if policy.is_some() {
                break;
            }
        }
    }

    if policy.is_none() && options.include_default_paths {
        for rel in DEFAULT_POLICY_PATHS {
            policy = read_if_present(Path::new(rel))?;
            if policy.is_some() {
                break;
            }
        }
    }

    let mut policy = match policy {
        Some(policy) => policy,
        None => {
            info!(target = "gatekeeper::policy", "using built-in policy");
            default_policy_file()
        }
    };

    if options.include_env {
        apply_env_overrides(&mut policy)?;
    }

    validate_policy(&policy)?;
    Ok(policy)
}

fn read_if_present(path: &Path) -> Result<Option<PolicyFile>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let policy = parse_policy_str(&content)?;
    info!(
        target = "gatekeeper::policy",
        path = %path.display(),
        routes = policy.routes.len(),
        roles = policy.permissions.len(),
        "loaded policy file"
    );
    Ok(Some(policy))
}

fn apply_env_overrides(policy: &mut PolicyFile) -> Result<(), ConfigError> {
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        apply_override(policy, &path, &parse_env_value(&raw))?;
    }
    Ok(())
}

pub(crate) fn apply_override(
    policy: &mut PolicyFile,
    path: &str,
    value: &Value,
) -> Result<(), ConfigError> {
    let dynamic = &mut policy.settings.dynamic;
    match path {
        "dynamic.max_permissions_per_identity" => {
            dynamic.max_permissions_per_identity = to_usize(value)?
        }
        "dynamic.batch_size" => dynamic.batch_size = to_usize(value)?,
        other => return Err(ConfigError::UnsupportedOverride(other.to_string())),
    }
    info!(target = "gatekeeper::policy", %path, %value, "applied env override");
    Ok(())
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn to_usize(value: &Value) -> Result<usize, ConfigError> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| ConfigError::InvalidValue(format!("expected integer, got {value}")))
}
