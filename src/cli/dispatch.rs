use anyhow::Result;

use super::app::Verdict;
use super::check::{cmd_check, cmd_check_route, cmd_explain};
use super::commands::Commands;
use super::env::CliArgs;
use super::validate::cmd_validate;

pub async fn dispatch(cli: &CliArgs) -> Result<Verdict> {
    match cli.command.clone() {
        Commands::Validate(args) => cmd_validate(args, cli.output),
        Commands::CheckRoute(args) => cmd_check_route(args, cli.output).await,
        Commands::Check(args) => cmd_check(args, cli.output).await,
        Commands::Explain(args) => cmd_explain(args, cli.output).await,
    }
}
