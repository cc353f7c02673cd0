//! WebSocket frames exchanged between browsers and the gateway.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::model::{Message, User};

/// Action requested by a client frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Post a chat message.
    Message,
    /// Leave the chat.
    Goodbye,
    /// Join the workspace.
    Letswork,
    /// Leave the workspace.
    Letsfinish,
    /// Push a workspace update.
    Update,
    /// Ask for a snapshot of the session.
    Sync,
}

/// A frame sent by a client.
///
/// `SessionID`, `UserID` and `Token` are accepted for compatibility but
/// ignored: identity always comes from the authenticated connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAction {
    /// Requested action.
    #[serde(rename = "Type")]
    pub kind: ActionKind,
    /// Chat text or workspace note.
    #[serde(rename = "Content", default)]
    pub content: String,
    /// Workspace code snapshot (`update` only).
    #[serde(rename = "Code", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Workspace schema snapshot (`update` only).
    #[serde(rename = "Schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Client's idea of its session.
    #[serde(rename = "SessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Client's idea of its user ID.
    #[serde(rename = "UserID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Client's copy of its token.
    #[serde(rename = "Token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ClientAction {
    /// An action with only a kind and content.
    pub fn new(kind: ActionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            code: None,
            schema: None,
            session_id: None,
            user_id: None,
            token: None,
        }
    }
}

/// Tag value of [`SyncMessage::kind`].
pub const SYNC_TYPE: &str = "sync";

/// Snapshot of a session as seen by the gateway, sent on explicit request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Session the snapshot describes.
    #[serde(rename = "SessionID")]
    pub session_id: SessionId,
    /// Current members.
    #[serde(rename = "Users")]
    pub users: Vec<User>,
    /// Chat log so far.
    #[serde(rename = "Chat")]
    pub chat: Vec<Message>,
    /// Always [`SYNC_TYPE`].
    #[serde(rename = "Type")]
    pub kind: String,
}

impl SyncMessage {
    /// Build a snapshot.
    pub fn new(session_id: SessionId, users: Vec<User>, chat: Vec<Message>) -> Self {
        Self {
            session_id,
            users,
            chat,
            kind: SYNC_TYPE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;
    use crate::model::MessageKind;
    use serde_json::json;

    #[test]
    fn decodes_full_client_frame() {
        let action: ClientAction = serde_json::from_value(json!({
            "SessionID": "s1",
            "UserID": "u1",
            "Content": "hello",
            "Type": "message",
            "Token": "t"
        }))
        .unwrap();
        assert_eq!(action.kind, ActionKind::Message);
        assert_eq!(action.content, "hello");
        assert_eq!(action.token.as_deref(), Some("t"));
    }

    #[test]
    fn decodes_minimal_client_frame() {
        let action: ClientAction = serde_json::from_str(r#"{"Type":"goodbye"}"#).unwrap();
        assert_eq!(action.kind, ActionKind::Goodbye);
        assert!(action.content.is_empty());
    }

    #[test]
    fn action_kinds_are_lowercase() {
        for (raw, kind) in [
            ("letswork", ActionKind::Letswork),
            ("letsfinish", ActionKind::Letsfinish),
            ("update", ActionKind::Update),
            ("sync", ActionKind::Sync),
        ] {
            let action: ClientAction =
                serde_json::from_value(json!({"Type": raw})).unwrap();
            assert_eq!(action.kind, kind);
        }
    }

    #[test]
    fn unknown_action_is_a_decode_failure() {
        assert!(serde_json::from_str::<ClientAction>(r#"{"Type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientAction>(r#"{"Content":"x"}"#).is_err());
        assert!(serde_json::from_str::<ClientAction>("not json").is_err());
    }

    #[test]
    fn sync_wire_shape() {
        let user = User::new(UserId::from("u1"), "alice");
        let msg = Message::authored(0, user.clone(), MessageKind::Message, "hi");
        let sync = SyncMessage::new(SessionId::from("s1"), vec![user], vec![msg]);
        let v = serde_json::to_value(&sync).unwrap();
        assert_eq!(v["Type"], "sync");
        assert_eq!(v["SessionID"], "s1");
        assert_eq!(v["Users"][0]["Username"], "alice");
        assert_eq!(v["Chat"][0]["Content"], "hi");
    }
}
