//! Session model shared by the gateway and the state services.
//!
//! Field names on the wire are `PascalCase` (`ID`, `User`, `Content`, `Type`)
//! because browser clients already speak that dialect.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A participant in a session.
///
/// The connection token is deliberately not part of this type: users are
/// copied into bus payloads and broadcast frames, the token never is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Globally unique user ID.
    #[serde(rename = "ID")]
    pub id: UserId,
    /// Name shown to other participants.
    #[serde(rename = "Username")]
    pub display_name: String,
}

impl User {
    /// Create a user.
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Kind of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Generated by a state service (arrivals, departures).
    System,
    /// Chat line authored by a user.
    Message,
    /// Workspace update authored by a user.
    Workspace,
}

/// Membership change described by a system message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notice {
    /// The author joined.
    Joined,
    /// The author left.
    Left,
}

/// One immutable entry of a session log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the session log, starting at 0.
    #[serde(rename = "ID")]
    pub id: u64,
    /// Author, or the affected user for system notices.
    #[serde(rename = "User", default)]
    pub user: Option<User>,
    /// Human-readable text.
    #[serde(rename = "Content", default)]
    pub content: String,
    /// Entry kind.
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    /// Membership change, set on join/leave system messages.
    #[serde(rename = "Notice", default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    /// Workspace code snapshot.
    #[serde(rename = "Code", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Workspace schema snapshot.
    #[serde(rename = "Schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl Message {
    /// A system notice about `user` joining or leaving.
    pub fn notice(id: u64, user: User, notice: Notice, content: impl Into<String>) -> Self {
        Self {
            id,
            user: Some(user),
            content: content.into(),
            kind: MessageKind::System,
            notice: Some(notice),
            code: None,
            schema: None,
        }
    }

    /// A user-authored entry.
    pub fn authored(id: u64, user: User, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id,
            user: Some(user),
            content: content.into(),
            kind,
            notice: None,
            code: None,
            schema: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> User {
        User::new(UserId::from("u1"), "alice")
    }

    #[test]
    fn user_wire_shape() {
        let v = serde_json::to_value(alice()).unwrap();
        assert_eq!(v, json!({"ID": "u1", "Username": "alice"}));
    }

    #[test]
    fn chat_message_wire_shape() {
        let msg = Message::authored(3, alice(), MessageKind::Message, "hello");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["ID"], 3);
        assert_eq!(v["User"]["Username"], "alice");
        assert_eq!(v["Content"], "hello");
        assert_eq!(v["Type"], "message");
        assert!(v.get("Notice").is_none());
        assert!(v.get("Code").is_none());
    }

    #[test]
    fn notice_message_is_system_kind() {
        let msg = Message::notice(0, alice(), Notice::Joined, "User alice has entered.");
        assert_eq!(msg.kind, MessageKind::System);
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["Type"], "system");
        assert_eq!(v["Notice"], "joined");
    }

    #[test]
    fn message_without_user_decodes() {
        let msg: Message =
            serde_json::from_value(json!({"ID": 0, "Content": "hi", "Type": "system"})).unwrap();
        assert!(msg.user.is_none());
        assert!(msg.notice.is_none());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let res = serde_json::from_value::<Message>(json!({"ID": 0, "Type": "shout"}));
        assert!(res.is_err());
    }
}
