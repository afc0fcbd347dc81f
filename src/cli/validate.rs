use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::app::Verdict;
use super::output::OutputFormat;
use super::runtime::load_policy_file;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Policy file (JSON or YAML)
    pub file: PathBuf,
}

pub fn cmd_validate(args: ValidateArgs, output: OutputFormat) -> Result<Verdict> {
    let policy = load_policy_file(&args.file)?;
    let dynamic = &policy.settings.dynamic;
    match output {
        OutputFormat::Json => {
            let payload = json!({
                "valid": true,
                "version": policy.version,
                "routes": policy.routes.len(),
                "routes_ignored": policy.effective_ignored().len(),
                "dynamic_routes": policy.dynamic_routes.len(),
                "roles": policy.permissions.len(),
                "settings": policy.settings,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Human => {
            println!("{}: valid (version {})", args.file.display(), policy.version);
            println!(
                "Routes → secured={}, ignored={}, dynamic={}",
                policy.routes.len(),
                policy.effective_ignored().len(),
                policy.dynamic_routes.len()
            );
            println!("Roles → {}", policy.permissions.len());
            println!(
                "Dynamic → max_permissions_per_identity={}, batch_size={}",
                dynamic.max_permissions_per_identity, dynamic.batch_size
            );
        }
    }
    Ok(Verdict::Allowed)
}
