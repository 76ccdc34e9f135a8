//! Top-level deploy operation.

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use flux_connection::{Connector, WsConnector};
use flux_protocol::StartRequest;

use crate::controller::SessionController;
use crate::descriptor::{DescriptorSource, FsDescriptorSource};
use crate::error::DeployError;
use crate::reporter::Reporter;
use crate::types::{DeployOutcome, DeployRequest, SessionConfig};

/// Deploys `request.file` to the Flux server at `request.endpoint`.
///
/// The Fluxfile is read before anything touches the network, so an
/// unreadable file fails with [`DeployError::File`] and no connection
/// attempt.
pub async fn deploy(
    request: &DeployRequest,
    config: SessionConfig,
    reporter: &mut dyn Reporter,
    cancel: CancellationToken,
) -> Result<DeployOutcome, DeployError> {
    let connector = WsConnector::for_endpoint(&request.endpoint, config.link.clone())
        .map_err(|e| DeployError::Endpoint(e.to_string()))?;
    deploy_via(
        request,
        config,
        &FsDescriptorSource,
        Box::new(connector),
        reporter,
        cancel,
    )
    .await
}

/// Like [`deploy`], with the Fluxfile source and the link factory supplied
/// by the caller.
pub async fn deploy_via(
    request: &DeployRequest,
    config: SessionConfig,
    descriptors: &dyn DescriptorSource,
    connector: Box<dyn Connector>,
    reporter: &mut dyn Reporter,
    cancel: CancellationToken,
) -> Result<DeployOutcome, DeployError> {
    let span = info_span!(
        "deploy",
        branch = %request.branch,
        commit = request.commit.as_deref().unwrap_or("-"),
    );

    async move {
        let fluxfile = descriptors.read(&request.file)?;
        info!(
            file = %request.file.display(),
            endpoint = connector.endpoint(),
            "starting deployment"
        );

        let start = StartRequest {
            token: request.token.clone(),
            branch: request.branch.clone(),
            fluxfile,
        };
        SessionController::new(start, connector, config, reporter)
            .with_cancel(cancel)
            .run()
            .await
    }
    .instrument(span)
    .await
}
