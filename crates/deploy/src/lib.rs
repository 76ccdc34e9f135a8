//! Deployment session logic for the Flux deploy client.
//!
//! Submits a Fluxfile over the deploy WebSocket and follows the resulting
//! deployment to completion, surviving dropped links without losing or
//! repeating progress.
//!
//! # Flow
//!
//! 1. **Load**: read the Fluxfile; nothing touches the network if it fails
//! 2. **Start**: send `deploy`, remember the id from `set_id`
//! 3. **Follow**: hand each new update to the [`Reporter`], advance the cursor
//! 4. **Resume**: after a reconnect send `follow` with the last cursor
//! 5. **Finish**: stop on the final update, a server error, the retry
//!    budget running out, or the deadline

pub mod controller;
pub mod deadline;
pub mod deploy;
pub mod descriptor;
pub mod error;
pub mod reporter;
pub mod session;
pub mod types;

// Re-export primary types for convenience.
pub use controller::SessionController;
pub use deadline::DeadlineGuard;
pub use deploy::{deploy, deploy_via};
pub use descriptor::{DescriptorSource, FsDescriptorSource};
pub use error::DeployError;
pub use reporter::{ChannelReporter, DeployEvent, Reporter};
pub use session::{Assignment, InvalidTransition, Session, SessionStatus};
pub use types::{DeployOutcome, DeployRequest, SessionConfig};
