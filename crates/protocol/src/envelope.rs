use serde::{Deserialize, Serialize};

use crate::constants::WS_MAX_MESSAGE_SIZE;
use crate::error::DecodeError;
use crate::messages::{AssignId, ErrorReport, ResumeRequest, StartRequest, Update};

/// Frame sent by the client, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// `{"action":"deploy", ...}` starts a new deployment.
    Deploy(StartRequest),
    /// `{"action":"follow", ...}` resumes an existing one.
    Follow(ResumeRequest),
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame sent by the server: `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    SetId(AssignId),
    Update(Update),
    Error(ErrorReport),
}

impl ServerMessage {
    /// Parses and validates one text frame.
    ///
    /// Anything that does not fit the schema is rejected here so that an
    /// ill-typed value never reaches the session state machine.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        if text.len() > WS_MAX_MESSAGE_SIZE {
            return Err(DecodeError::TooLarge {
                size: text.len(),
                limit: WS_MAX_MESSAGE_SIZE,
            });
        }

        let msg: ServerMessage = serde_json::from_str(text)?;
        if let ServerMessage::Update(update) = &msg {
            update.validate()?;
        }
        Ok(msg)
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetId(_) => "set_id",
            Self::Update(_) => "update",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{Cursors, Position};
    use crate::messages::PathSegment;

    #[test]
    fn deploy_frame_shape() {
        let msg = ClientMessage::Deploy(StartRequest {
            token: "tok".into(),
            branch: "main".into(),
            fluxfile: "jobs: {}\n".into(),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "deploy",
                "token": "tok",
                "branch": "main",
                "fluxfile": "jobs: {}\n",
            })
        );
    }

    #[test]
    fn follow_frame_shape() {
        let msg = ClientMessage::Follow(ResumeRequest {
            token: "tok".into(),
            deployment_id: "dep-1".into(),
            cursors: Some(Cursors::new().with("build", Position::Number(7))),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["action"], "follow");
        assert_eq!(json["deployment_id"], "dep-1");
        assert_eq!(json["cursors"]["build"], 7);
    }

    #[test]
    fn decode_set_id() {
        let msg = ServerMessage::decode(r#"{"type":"set_id","data":{"deployment_id":"d-9"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::SetId(AssignId {
                deployment_id: "d-9".into()
            })
        );
        assert_eq!(msg.kind(), "set_id");
    }

    #[test]
    fn decode_error_frame_keeps_detail_order() {
        let text = r#"{"type":"error","data":{"error":"Invalid Fluxfile","details":[
            {"message":"first","path":["jobs",0]},
            {"message":"second","path":["env"]}
        ]}}"#;
        let ServerMessage::Error(report) = ServerMessage::decode(text).unwrap() else {
            panic!("expected error frame");
        };
        assert_eq!(report.message(), "Invalid Fluxfile");
        assert_eq!(report.details.len(), 2);
        assert_eq!(report.details[0].message, "first");
        assert_eq!(
            report.details[0].path,
            vec![PathSegment::Key("jobs".into()), PathSegment::Index(0)]
        );
        assert_eq!(report.details[1].message, "second");
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let err = ServerMessage::decode(r#"{"type":"hello","data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(ServerMessage::decode("not json {{{").is_err());
        assert!(ServerMessage::decode(r#"{"type":"update"}"#).is_err());
    }

    #[test]
    fn decode_validates_update_progress() {
        let text = r#"{"type":"update","data":{"step":"Build","progress":{"step":2,"sub_step":0}}}"#;
        assert!(matches!(
            ServerMessage::decode(text),
            Err(DecodeError::ProgressOutOfRange { field: "step", .. })
        ));
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let huge = "x".repeat(WS_MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            ServerMessage::decode(&huge),
            Err(DecodeError::TooLarge { .. })
        ));
    }
}
