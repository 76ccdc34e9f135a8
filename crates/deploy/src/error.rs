//! Deploy error types.

use std::path::PathBuf;
use std::time::Duration;

use flux_connection::TransportError;
use flux_protocol::{ErrorDetail, FinalStatus};

/// Terminal failure of a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("cannot read Fluxfile {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// Reported by the server with an `error` frame. `details` keep the
    /// server's order so they can be annotated against the Fluxfile.
    #[error("{message}")]
    Protocol {
        message: String,
        details: Vec<ErrorDetail>,
    },

    #[error("deployment finished with status {status}")]
    Failed { status: FinalStatus },

    #[error("deployment timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("socket is not open")]
    NotOpen,

    #[error("deployment cancelled")]
    Cancelled,

    #[error("reporter aborted the deployment: {0}")]
    Reporter(String),

    #[error("session already resolved")]
    AlreadyResolved,
}

impl DeployError {
    /// Stable short name of the error kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Endpoint(_) => "endpoint",
            Self::Connection(_) => "connection",
            Self::Decode(_) => "decode",
            Self::Protocol { .. } => "protocol",
            Self::Failed { .. } => "failed",
            Self::Timeout(_) => "timeout",
            Self::NotOpen => "not_open",
            Self::Cancelled => "cancelled",
            Self::Reporter(_) => "reporter",
            Self::AlreadyResolved => "already_resolved",
        }
    }
}

impl From<TransportError> for DeployError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotOpen => Self::NotOpen,
            TransportError::Decode(e) => Self::Decode(e.to_string()),
            TransportError::Encode(e) => Self::Decode(e.to_string()),
            e @ (TransportError::Connection { .. } | TransportError::InvalidState { .. }) => {
                Self::Connection(e.to_string())
            }
        }
    }
}
