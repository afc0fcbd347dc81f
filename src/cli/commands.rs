use clap::Subcommand;

use super::check::{CheckArgs, CheckRouteArgs};
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Validate a policy file
    Validate(ValidateArgs),
    /// Authorize an identity against a route
    CheckRoute(CheckRouteArgs),
    /// Authorize an identity against explicit operations
    Check(CheckArgs),
    /// Show the outcome of every operation without stopping at the first denial
    Explain(CheckArgs),
}
