//! Wire protocol shared by the Flux deploy client crates.

pub mod constants;
pub mod cursor;
pub mod envelope;
pub mod error;
pub mod messages;

// Re-export primary types for convenience.
pub use cursor::{Cursors, Position, Progression};
pub use envelope::{ClientMessage, ServerMessage};
pub use error::DecodeError;
pub use messages::{
    AssignId, ComponentLog, ErrorDetail, ErrorReport, FinalStatus, PathSegment, Progress,
    ResumeRequest, StartRequest, Update,
};
