pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;
pub mod route;
pub mod validate;

pub use defaults::default_policy_file;
pub use errors::ConfigError;
pub use loader::{load_policy, load_policy_from_path, parse_policy_str, LoadOptions};
pub use model::{
    DynamicRoutesMap, DynamicSettings, EngineSettings, OperationTemplate, PermissionsMap,
    PolicyFile, RoutesIgnored, RoutesMap,
};
pub use route::{normalize_path, RouteMatch, RouteTable, RouteTemplate};
pub use validate::validate_policy;

#[cfg(test)]
mod tests;
