//! Drives one deployment session to a terminal state.
//!
//! The [`SessionController`] is the only place where session state
//! changes. The deadline, the watchdog, external cancellation and the
//! transport all feed one `select!` loop; each iteration handles exactly
//! one event, so updates reach the [`Reporter`] in order and never
//! concurrently.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flux_connection::{Connector, Inbound, Stall, TransportError, TransportSocket, Watchdog};
use flux_protocol::{
    AssignId, ClientMessage, DecodeError, FinalStatus, Progression, ResumeRequest, ServerMessage,
    StartRequest, Update,
};

use crate::deadline::DeadlineGuard;
use crate::error::DeployError;
use crate::reporter::Reporter;
use crate::session::{Assignment, Session, SessionStatus};
use crate::types::{DeployOutcome, SessionConfig};

enum Event {
    Deadline(Duration),
    Cancelled,
    Stalled(Stall),
    Inbound(Result<Inbound, TransportError>),
}

/// `Some` once the session has resolved.
type Resolution = Option<Result<DeployOutcome, DeployError>>;

/// Owns the session, its transport and its timers for one run.
pub struct SessionController<'r> {
    start: StartRequest,
    config: SessionConfig,
    session: Session,
    transport: TransportSocket,
    watchdog: Option<Watchdog>,
    reporter: &'r mut dyn Reporter,
    cancel: CancellationToken,
    updates_reported: u32,
    reconnects: u32,
}

impl<'r> SessionController<'r> {
    pub fn new(
        start: StartRequest,
        connector: Box<dyn Connector>,
        config: SessionConfig,
        reporter: &'r mut dyn Reporter,
    ) -> Self {
        let transport = TransportSocket::new(connector, config.retry.clone());
        Self {
            start,
            config,
            session: Session::new(),
            transport,
            watchdog: None,
            reporter,
            cancel: CancellationToken::new(),
            updates_reported: 0,
            reconnects: 0,
        }
    }

    /// Lets the caller stop the run, e.g. on Ctrl-C.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the session until it succeeds, fails or times out.
    ///
    /// Timers and the connection are released before this returns, on
    /// every path. A second call fails with [`DeployError::AlreadyResolved`].
    pub async fn run(&mut self) -> Result<DeployOutcome, DeployError> {
        if self.session.status() != SessionStatus::Unstarted {
            return Err(DeployError::AlreadyResolved);
        }

        let mut deadline = DeadlineGuard::start(self.config.timeout);
        let result = self.drive(&mut deadline).await;

        deadline.cancel();
        self.stop_watchdog();
        self.transport.close().await;
        result
    }

    async fn drive(&mut self, deadline: &mut DeadlineGuard) -> Result<DeployOutcome, DeployError> {
        self.enter(SessionStatus::Connecting);
        if let Err(e) = self.transport.connect() {
            return Err(self.fail(e.into()));
        }

        loop {
            let event = tokio::select! {
                biased;
                after = deadline.expired() => Event::Deadline(after),
                _ = self.cancel.cancelled() => Event::Cancelled,
                stall = next_stall(&mut self.watchdog) => Event::Stalled(stall),
                inbound = self.transport.receive_next() => Event::Inbound(inbound),
            };

            if let Some(result) = self.handle(event).await {
                return result;
            }
        }
    }

    async fn handle(&mut self, event: Event) -> Resolution {
        match event {
            Event::Deadline(after) => {
                warn!(timeout_s = after.as_secs(), "deployment deadline reached");
                Some(Err(self.fail(DeployError::Timeout(after))))
            }
            Event::Cancelled => {
                info!("deployment cancelled");
                Some(Err(self.fail(DeployError::Cancelled)))
            }
            Event::Stalled(stall) => {
                warn!(
                    silent_ms = stall.silent_for.as_millis() as u64,
                    "no progress from server, replacing the link"
                );
                self.transport.force_reconnect();
                None
            }
            Event::Inbound(Ok(Inbound::Opened { attempt })) => {
                self.on_opened(attempt).await;
                None
            }
            Event::Inbound(Ok(Inbound::Message(msg))) => {
                self.touch();
                self.on_message(msg)
            }
            Event::Inbound(Ok(Inbound::EndOfStream)) => {
                let err = DeployError::Connection(
                    "server closed the stream before the deployment finished".into(),
                );
                Some(Err(self.fail(err)))
            }
            Event::Inbound(Err(TransportError::Decode(e))) => {
                self.touch();
                self.on_bad_frame(e)
            }
            Event::Inbound(Err(e)) => Some(Err(self.fail(e.into()))),
        }
    }

    async fn on_opened(&mut self, attempt: u32) {
        if self.session.status() == SessionStatus::Connecting {
            self.enter(SessionStatus::Active);
            self.watchdog = Some(Watchdog::start(self.config.watchdog.clone()));
        } else {
            self.reconnects += 1;
        }
        self.touch();

        let request = match self.session.job_id() {
            None => ClientMessage::Deploy(self.start.clone()),
            Some(id) => ClientMessage::Follow(ResumeRequest {
                token: self.start.token.clone(),
                deployment_id: id.to_string(),
                cursors: self.session.cursor().cloned(),
            }),
        };
        let action = match &request {
            ClientMessage::Deploy(_) => "deploy",
            ClientMessage::Follow(_) => "follow",
        };
        info!(attempt, action, "link open, sending request");

        // A dead link shows up as a close on the next receive.
        if let Err(e) = self.transport.send(&request).await {
            warn!(error = %e, action, "could not send request");
        }
    }

    fn on_message(&mut self, msg: ServerMessage) -> Resolution {
        debug!(kind = msg.kind(), "frame received");
        match msg {
            ServerMessage::SetId(AssignId { deployment_id }) => {
                match self.session.assign_job_id(deployment_id.clone()) {
                    Assignment::Assigned => info!(%deployment_id, "deployment started"),
                    Assignment::AlreadySet { current } if current == deployment_id => {
                        debug!(%deployment_id, "deployment id confirmed");
                    }
                    Assignment::AlreadySet { current } => {
                        warn!(%current, ignored = %deployment_id, "server sent another deployment id, keeping the first");
                    }
                }
                None
            }
            ServerMessage::Update(update) => self.on_update(update),
            ServerMessage::Error(report) => {
                let err = DeployError::Protocol {
                    message: report.message().to_string(),
                    details: report.details,
                };
                Some(Err(self.fail(err)))
            }
        }
    }

    fn on_update(&mut self, update: Update) -> Resolution {
        if let Some(cursors) = &update.cursors {
            match self.session.progression(cursors) {
                Progression::Ahead => {}
                // Cursors only move with log output, so an unchanged cursor
                // on a log-free or final update is fresh progress.
                Progression::Same if !update.is_done && !update.logs.is_empty() => {
                    debug!(cursor = %cursors, "dropping replayed update");
                    return None;
                }
                Progression::Same => {}
                Progression::Behind => {
                    let applied = self
                        .session
                        .cursor()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    let err = DeployError::Decode(format!(
                        "cursor went backwards: received {cursors}, already at {applied}"
                    ));
                    return Some(Err(self.fail(err)));
                }
            }
        }

        // Report first, then commit the cursor.
        self.reporter.report(&update);
        self.updates_reported += 1;
        if let Some(cursors) = update.cursors.clone() {
            self.session.advance_cursor(cursors);
        }

        if !update.is_done {
            return None;
        }
        if update.is_success() {
            info!(updates = self.updates_reported, reconnects = self.reconnects, "deployment succeeded");
            self.enter(SessionStatus::DoneSuccess);
            return Some(Ok(self.outcome()));
        }

        let status = update.status.unwrap_or(FinalStatus::Unknown);
        warn!(%status, "deployment finished unsuccessfully");
        let err = DeployError::Failed { status };
        self.notify(&err);
        self.enter(SessionStatus::DoneFailure);
        Some(Err(err))
    }

    fn on_bad_frame(&mut self, err: DecodeError) -> Resolution {
        let err = DeployError::Decode(err.to_string());
        warn!(error = %err, "ignoring malformed frame");
        match self.reporter.report_error(&err) {
            Ok(()) => None,
            Err(abort) => {
                warn!(error = %abort, "reporter aborted the deployment");
                self.enter(SessionStatus::Failed);
                Some(Err(abort))
            }
        }
    }

    /// Reports `err` and moves the session to `Failed`.
    fn fail(&mut self, err: DeployError) -> DeployError {
        self.notify(&err);
        self.enter(SessionStatus::Failed);
        err
    }

    fn notify(&mut self, err: &DeployError) {
        if let Err(e) = self.reporter.report_error(err) {
            warn!(error = %e, "reporter failed while reporting an error");
        }
    }

    fn enter(&mut self, status: SessionStatus) {
        if let Err(e) = self.session.transition(status) {
            error!(error = %e, "session state machine violated");
            return;
        }
        debug!(%status, "session status");
        if status.is_terminal() {
            self.stop_watchdog();
        }
    }

    fn touch(&mut self) {
        self.session.touch();
        if let Some(watchdog) = &self.watchdog {
            watchdog.touch();
        }
    }

    fn stop_watchdog(&mut self) {
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
    }

    fn outcome(&self) -> DeployOutcome {
        DeployOutcome {
            deployment_id: self.session.job_id().map(str::to_string),
            updates_reported: self.updates_reported,
            reconnects: self.reconnects,
        }
    }
}

async fn next_stall(watchdog: &mut Option<Watchdog>) -> Stall {
    match watchdog {
        Some(watchdog) => watchdog.stalled().await,
        None => std::future::pending().await,
    }
}
