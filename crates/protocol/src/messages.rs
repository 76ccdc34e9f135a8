use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursors;
use crate::error::DecodeError;

// ---------------------------------------------------------------------------
// Client requests
// ---------------------------------------------------------------------------

/// Starts a new deployment from a Fluxfile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub token: String,
    pub branch: String,
    pub fluxfile: String,
}

/// Re-attaches to a running deployment after a reconnect.
///
/// `cursors` is `null` until the first cursor-bearing update was applied,
/// in which case the server replays from the beginning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub token: String,
    pub deployment_id: String,
    pub cursors: Option<Cursors>,
}

// ---------------------------------------------------------------------------
// Server frames
// ---------------------------------------------------------------------------

/// Payload of `set_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignId {
    pub deployment_id: String,
}

/// Completion of the current step and of its current sub-step, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub step: f64,
    pub sub_step: f64,
}

/// Final outcome carried by the last update of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Log output of one component, already decoded from base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLog {
    pub component: String,
    pub data: Vec<u8>,
}

/// Payload of `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub step: String,
    pub progress: Progress,
    /// Component logs in the order the server listed them.
    #[serde(default, with = "component_logs")]
    pub logs: Vec<ComponentLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FinalStatus>,
}

impl Update {
    /// Rejects progress values outside `[0, 1]` (NaN included).
    pub fn validate(&self) -> Result<(), DecodeError> {
        for (field, value) in [("step", self.progress.step), ("sub_step", self.progress.sub_step)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DecodeError::ProgressOutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// `true` when this update closes the deployment successfully.
    ///
    /// A done update without a status counts as success; older servers never
    /// sent one.
    pub fn is_success(&self) -> bool {
        self.is_done && matches!(self.status, None | Some(FinalStatus::Success))
    }
}

/// One segment of the location of a Fluxfile error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(u64),
    Key(String),
}

/// A single located problem reported with an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

impl ErrorDetail {
    /// Renders the path as `jobs.build[0].image`.
    pub fn location(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Index(i) => out.push_str(&format!("[{i}]")),
                PathSegment::Key(k) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(k);
                }
            }
        }
        out
    }
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl ErrorReport {
    /// The headline message, with a generic fallback when the server sent none.
    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or("Could not deploy")
    }
}

/// `{"<component>": "<base64>", ...}` as an ordered list of decoded logs.
mod component_logs {
    use std::fmt;

    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::ComponentLog;

    pub fn serialize<S: Serializer>(logs: &[ComponentLog], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(logs.len()))?;
        for log in logs {
            map.serialize_entry(&log.component, &STANDARD.encode(&log.data))?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ComponentLog>, D::Error> {
        deserializer.deserialize_map(LogsVisitor)
    }

    struct LogsVisitor;

    impl<'de> Visitor<'de> for LogsVisitor {
        type Value = Vec<ComponentLog>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of component name to base64 log data")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut logs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((component, encoded)) = access.next_entry::<String, String>()? {
                let data = STANDARD.decode(&encoded).map_err(|e| {
                    serde::de::Error::custom(format!("invalid base64 logs for {component}: {e}"))
                })?;
                logs.push(ComponentLog { component, data });
            }
            Ok(logs)
        }
    }
}
