//! Session state that survives reconnects.

use std::fmt;

use tokio::time::Instant;

use flux_protocol::{Cursors, Progression};

/// Lifecycle of a deployment session. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unstarted,
    Connecting,
    Active,
    DoneSuccess,
    DoneFailure,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::DoneSuccess | Self::DoneFailure | Self::Failed)
    }

    fn can_become(self, next: Self) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Unstarted, Connecting) => true,
            (Connecting, Active) => true,
            (Active, DoneSuccess | DoneFailure) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unstarted => "unstarted",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::DoneSuccess => "done (success)",
            Self::DoneFailure => "done (failure)",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Outcome of [`Session::assign_job_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Assigned,
    /// An id was already recorded and was kept.
    AlreadySet { current: String },
}

/// The logical deployment, independent of which physical link carries it.
#[derive(Debug)]
pub struct Session {
    job_id: Option<String>,
    cursor: Option<Cursors>,
    status: SessionStatus,
    last_activity: Option<Instant>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            job_id: None,
            cursor: None,
            status: SessionStatus::Unstarted,
            last_activity: None,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn cursor(&self) -> Option<&Cursors> {
        self.cursor.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Records the server-assigned id. The first id wins for the lifetime
    /// of the session.
    pub fn assign_job_id(&mut self, id: String) -> Assignment {
        match &self.job_id {
            Some(current) => Assignment::AlreadySet {
                current: current.clone(),
            },
            None => {
                self.job_id = Some(id);
                Assignment::Assigned
            }
        }
    }

    /// How `incoming` relates to the applied cursor. Anything is ahead of
    /// no cursor at all.
    pub fn progression(&self, incoming: &Cursors) -> Progression {
        match &self.cursor {
            Some(applied) => incoming.progression_from(applied),
            None => Progression::Ahead,
        }
    }

    /// Moves the cursor forward. Returns `false`, leaving the cursor
    /// untouched, unless `next` is strictly ahead.
    pub fn advance_cursor(&mut self, next: Cursors) -> bool {
        if self.progression(&next) != Progression::Ahead {
            return false;
        }
        self.cursor = Some(next);
        true
    }

    pub fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    pub fn transition(&mut self, to: SessionStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_become(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
