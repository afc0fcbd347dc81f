use std::process::ExitCode;

use clap::Parser;
use gatekeeper_core_types::ErrorKind;
use gatekeeper_permissions_broker::{AuthzError, SourceError};
use gatekeeper_policy_center::ConfigError;
use tracing::{debug, error};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;

pub const EXIT_ALLOWED: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_DENIED: u8 = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Allowed,
    Denied,
}

impl Verdict {
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Allowed => EXIT_ALLOWED,
            Verdict::Denied => EXIT_DENIED,
        }
    }
}

/// Configuration problems exit with [`EXIT_CONFIG`]; anything else that is
/// not a verdict exits with [`EXIT_FAILURE`].
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    let configuration = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || cause
                .downcast_ref::<AuthzError>()
                .is_some_and(|authz| authz.kind() == ErrorKind::Configuration)
            || cause
                .downcast_ref::<SourceError>()
                .is_some_and(|source| source.kind() == ErrorKind::Configuration)
    });
    if configuration {
        EXIT_CONFIG
    } else {
        EXIT_FAILURE
    }
}

pub async fn run() -> ExitCode {
    let cli = CliArgs::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.debug, cli.log_json) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_FAILURE);
    }

    match dispatch(&cli).await {
        Ok(verdict) => {
            debug!(?verdict, "command completed");
            ExitCode::from(verdict.exit_code())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use gatekeeper_core_types::HttpMethod;

    #[test]
    fn configuration_errors_map_to_config_exit_code() {
        let err = Err::<(), _>(ConfigError::RouteMap {
            route: "/a".into(),
        })
        .context("loading policy")
        .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG);

        let unsecured: anyhow::Error = AuthzError::from(SourceError::RouteNotSecured {
            route: "/b".into(),
            method: HttpMethod::Get,
        })
        .into();
        assert_eq!(exit_code_for(&unsecured), EXIT_CONFIG);
    }

    #[test]
    fn other_errors_are_failures() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&err), EXIT_FAILURE);
        assert_eq!(Verdict::Denied.exit_code(), EXIT_DENIED);
    }
}
