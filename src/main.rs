use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    gatekeeper_cli::cli::app::run().await
}
