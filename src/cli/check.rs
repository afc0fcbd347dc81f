use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gatekeeper_core_types::{HttpMethod, Identity, Operation};
use gatekeeper_decision_engine::OperationDecision;
use gatekeeper_permissions_broker::{Authorizer, AuthzError};
use serde_json::json;

use super::app::Verdict;
use super::output::OutputFormat;
use super::runtime::load_policy_file;
use super::session::build_service;

#[derive(Args, Clone, Debug)]
pub struct IdentityArgs {
    /// Policy file (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Seed an in-memory dynamic session from this grants file
    #[arg(long, value_name = "FILE")]
    pub grants: Option<PathBuf>,

    /// Authenticated user id
    #[arg(long, default_value = "anonymous")]
    pub user: String,

    /// Role or group membership (repeatable)
    #[arg(long = "role", value_name = "ROLE")]
    pub roles: Vec<String>,
}

impl IdentityArgs {
    fn identity(&self) -> Identity {
        Identity::new(self.user.as_str()).with_roles(self.roles.iter().map(String::as_str))
    }
}

#[derive(Args, Clone, Debug)]
pub struct CheckRouteArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Request path, e.g. /projects/p-1
    #[arg(long)]
    pub route: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Operation as ACTION:Subject[:field] (repeatable)
    #[arg(long = "operation", value_name = "OP", required = true)]
    pub operations: Vec<String>,
}

impl CheckArgs {
    fn operations(&self) -> Result<Vec<Operation>> {
        self.operations
            .iter()
            .map(|raw| {
                raw.parse::<Operation>()
                    .with_context(|| format!("Invalid operation `{raw}`"))
            })
            .collect()
    }
}

pub async fn cmd_check_route(args: CheckRouteArgs, output: OutputFormat) -> Result<Verdict> {
    let method: HttpMethod = args
        .method
        .parse()
        .with_context(|| format!("Invalid method `{}`", args.method))?;
    let policy = load_policy_file(&args.identity.config)?;
    let service = build_service(&policy, args.identity.grants.as_deref()).await?;
    let result = service
        .is_authorized_on_route(&args.identity.identity(), &args.route, method)
        .await;
    report(result, output)
}

pub async fn cmd_check(args: CheckArgs, output: OutputFormat) -> Result<Verdict> {
    let operations = args.operations()?;
    let policy = load_policy_file(&args.identity.config)?;
    let service = build_service(&policy, args.identity.grants.as_deref()).await?;
    let result = service
        .is_authorized_on_subject(&args.identity.identity(), &operations)
        .await;
    report(result, output)
}

pub async fn cmd_explain(args: CheckArgs, output: OutputFormat) -> Result<Verdict> {
    let operations = args.operations()?;
    let policy = load_policy_file(&args.identity.config)?;
    let service = build_service(&policy, args.identity.grants.as_deref()).await?;
    let outcomes = service
        .explain_on_subject(&args.identity.identity(), &operations)
        .await?;

    let verdict = if outcomes.iter().all(|(_, decision)| decision.is_allowed()) {
        Verdict::Allowed
    } else {
        Verdict::Denied
    };
    match output {
        OutputFormat::Json => {
            let rows: Vec<_> = outcomes
                .iter()
                .map(|(operation, decision)| {
                    json!({
                        "operation": operation.to_string(),
                        "outcome": outcome_label(decision),
                        "reason": decision.reason(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "allowed": verdict == Verdict::Allowed,
                    "operations": rows,
                }))?
            );
        }
        OutputFormat::Human => {
            for (operation, decision) in &outcomes {
                match decision.reason() {
                    Some(reason) => {
                        println!("{:<11} {operation}: {reason}", outcome_label(decision))
                    }
                    None => println!("{:<11} {operation}", outcome_label(decision)),
                }
            }
        }
    }
    Ok(verdict)
}

fn outcome_label(decision: &OperationDecision) -> &'static str {
    match decision {
        OperationDecision::Allowed => "ALLOWED",
        OperationDecision::Denied { .. } => "DENIED",
        OperationDecision::NotGranted { .. } => "NOT_GRANTED",
    }
}

/// Denials become a verdict; every other failure stays an error.
fn report(result: Result<(), AuthzError>, output: OutputFormat) -> Result<Verdict> {
    let (verdict, reason) = match result {
        Ok(()) => (Verdict::Allowed, None),
        Err(AuthzError::Forbidden { reason }) => (Verdict::Denied, Some(reason)),
        Err(other) => return Err(other.into()),
    };
    match output {
        OutputFormat::Json => {
            let payload = json!({
                "allowed": verdict == Verdict::Allowed,
                "reason": reason,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Human => match reason {
            Some(reason) => println!("DENY: User is forbidden: {reason}"),
            None => println!("ALLOW"),
        },
    }
    Ok(verdict)
}
