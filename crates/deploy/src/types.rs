//! Data types for the deploy flow.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use flux_connection::{LinkConfig, RetryPolicy, WatchdogConfig};
use flux_protocol::constants::DEFAULT_DEPLOY_TIMEOUT;

/// What to deploy and where.
#[derive(Clone)]
pub struct DeployRequest {
    /// Base URL of the Flux server, `http(s)://` or `ws(s)://`.
    pub endpoint: String,
    pub token: String,
    pub branch: String,
    /// Commit being deployed. Informational only, it is not sent.
    pub commit: Option<String>,
    /// Path to the Fluxfile.
    pub file: PathBuf,
}

impl fmt::Debug for DeployRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployRequest")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("branch", &self.branch)
            .field("commit", &self.commit)
            .field("file", &self.file)
            .finish()
    }
}

/// Tunables for one deployment session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub retry: RetryPolicy,
    pub watchdog: WatchdogConfig,
    pub link: LinkConfig,
    /// Overall deadline for the whole run.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            watchdog: WatchdogConfig::default(),
            link: LinkConfig::default(),
            timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }
}

/// Summary of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub deployment_id: Option<String>,
    /// Updates handed to the reporter, replays excluded.
    pub updates_reported: u32,
    /// Links re-established after the first one.
    pub reconnects: u32,
}
