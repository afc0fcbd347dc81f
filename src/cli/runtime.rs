use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use gatekeeper_policy_center::{load_policy, ConfigError, LoadOptions, PolicyFile};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Loads exactly the policy at `path` with `GATEKEEPER__` setting overrides
/// applied. `GATEKEEPER_POLICY_PATH` is not consulted since the path was given
/// explicitly. A missing file is an error, not a fallback to the built-in
/// policy.
pub fn load_policy_file(path: &Path) -> Result<PolicyFile> {
    if !path.exists() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "policy file does not exist");
        return Err(ConfigError::Io(missing))
            .with_context(|| format!("Failed to load policy from {}", path.display()));
    }
    load_policy(&LoadOptions::exact(path))
        .with_context(|| format!("Failed to load policy from {}", path.display()))
}
