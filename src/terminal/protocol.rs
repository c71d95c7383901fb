use serde::{Deserialize, Serialize};

use crate::model::ProjectId;

/// Client → backend messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Start { project_id: ProjectId, user_id: String },
    Input { data: String },
    Stop,
}

/// Backend → client messages. The backend never sends `output` before
/// `ready`, and `closed` ends the session instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Ready,
    Output { data: String },
    Closed,
}

impl ClientMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_message_wire_shape() {
        let msg = ClientMessage::Start {
            project_id: ProjectId::new("p1"),
            user_id: "u1".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "start", "projectId": "p1", "userId": "u1"})
        );
        assert_eq!(ClientMessage::Stop.to_json().unwrap(), r#"{"type":"stop"}"#);
    }

    #[test]
    fn parses_backend_messages() {
        assert_eq!(ServerMessage::from_json(r#"{"type":"ready"}"#).unwrap(), ServerMessage::Ready);
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"output","data":"a\nb"}"#).unwrap(),
            ServerMessage::Output { data: "a\nb".into() }
        );
        assert!(ServerMessage::from_json(r#"{"type":"bogus"}"#).is_err());
    }
}
