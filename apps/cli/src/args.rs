//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use flux_connection::{RetryPolicy, WatchdogConfig};
use flux_deploy::{DeployRequest, SessionConfig};
use flux_protocol::constants::{DEFAULT_DEPLOY_TIMEOUT, DEFAULT_RETRIES, DEFAULT_STALL_THRESHOLD};

#[derive(Debug, Parser)]
#[command(
    name = "flux-deploy",
    about = "Deploy a Fluxfile to a Flux server and follow its progress",
    version,
    long_about = None
)]
pub struct Cli {
    /// Branch to deploy.
    #[arg(short, long)]
    pub branch: String,

    /// SHA of the deployed commit.
    #[arg(short, long)]
    pub commit: Option<String>,

    /// Fluxfile to use.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Timeout in seconds.
    #[arg(short, long, default_value_t = DEFAULT_DEPLOY_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Consecutive failed connections tolerated before giving up.
    #[arg(long, default_value_t = DEFAULT_RETRIES, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: u32,

    /// Seconds without any frame before the connection is replaced.
    #[arg(long, default_value_t = DEFAULT_STALL_THRESHOLD.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub stall_timeout: u64,

    /// Base URL of the Flux server.
    #[arg(long, env = "FLUX_ENDPOINT", hide_env_values = true)]
    pub endpoint: String,

    /// Deploy token.
    #[arg(long, env = "FLUX_TOKEN", hide_env_values = true)]
    pub token: String,
}

impl Cli {
    pub fn request(&self) -> DeployRequest {
        DeployRequest {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            branch: self.branch.clone(),
            commit: self.commit.clone(),
            file: self.file.clone(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            retry: RetryPolicy {
                retries: self.retries,
                ..RetryPolicy::default()
            },
            watchdog: WatchdogConfig {
                stall_threshold: Duration::from_secs(self.stall_timeout),
                ..WatchdogConfig::default()
            },
            timeout: Duration::from_secs(self.timeout),
            ..SessionConfig::default()
        }
    }
}
