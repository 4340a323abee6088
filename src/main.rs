//! merge-pr-to-branch CLI

mod cli;

use clap::Parser;
use cli::Cli;
use std::error::Error as _;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    merge_pr_to_branch::telemetry::init_tracing(cli.log_json, cli.log_level());

    match cli::run::run(&cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            let mut chain = Vec::new();
            let mut source = e.source();
            while let Some(cause) = source {
                chain.push(cause.to_string());
                source = cause.source();
            }
            error!(error = %e, causes = ?chain, "reconciliation failed");
            ExitCode::FAILURE
        }
    }
}
