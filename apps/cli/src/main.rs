//! `flux-deploy`: deploys a Fluxfile to a Flux server and follows it to
//! completion.
//!
//! Progress is written to stdout; diagnostics go to stderr through
//! `tracing` (set `RUST_LOG` to see more than warnings).

mod args;
mod reporter;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::reporter::TerminalReporter;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version are not failures.
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e:#}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(deploy(cli))
}

async fn deploy(cli: Cli) -> anyhow::Result<()> {
    let request = cli.request();
    let config = cli.session_config();
    info!(version = env!("CARGO_PKG_VERSION"), ?request, "flux-deploy starting");

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut reporter = TerminalReporter::stdout(&request.file);
    let result = flux_deploy::deploy(&request, config, &mut reporter, cancel).await;
    reporter.finish();
    ctrl_c.abort();

    let outcome = result?;
    info!(
        deployment_id = outcome.deployment_id.as_deref().unwrap_or("-"),
        updates = outcome.updates_reported,
        reconnects = outcome.reconnects,
        "deployment complete"
    );
    Ok(())
}
