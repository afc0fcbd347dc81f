use gatekeeper_core_types::ErrorKind;
use thiserror::Error;

/// Errors surfaced while loading or validating policy configuration.
///
/// All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize policy: {0}")]
    Deserialize(String),
    #[error("route {route} is both secured and ignored")]
    RouteMap { route: String },
    #[error("invalid route template `{route}`: {detail}")]
    InvalidRoute { route: String, detail: String },
    #[error("unsupported override path: {0}")]
    UnsupportedOverride(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
