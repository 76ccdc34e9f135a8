//! Decode errors raised at the wire boundary.

/// A server frame that could not be turned into a [`ServerMessage`](crate::ServerMessage).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("{field} progress {value} is outside [0, 1]")]
    ProgressOutOfRange { field: &'static str, value: f64 },
}
