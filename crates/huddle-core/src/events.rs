//! Payloads carried on the bus between the gateway and the state services.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::model::User;

/// Body of `user.<uid>.new` / `user.<uid>.leave` subjects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvent {
    /// The user joining or leaving.
    #[serde(rename = "User")]
    pub user: User,
}

/// Body of `<domain>.in` subjects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Author.
    #[serde(rename = "User")]
    pub user: User,
    /// Chat text or workspace note.
    #[serde(rename = "Content", default)]
    pub content: String,
    /// Workspace code snapshot.
    #[serde(rename = "Code", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Workspace schema snapshot.
    #[serde(rename = "Schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl InboundEvent {
    /// A plain content event with no workspace payload.
    pub fn text(user: User, content: impl Into<String>) -> Self {
        Self {
            user,
            content: content.into(),
            code: None,
            schema: None,
        }
    }
}

/// Body of `session.new`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAnnouncement {
    /// The newly created session.
    #[serde(rename = "ID")]
    pub id: SessionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;
    use serde_json::json;

    #[test]
    fn inbound_event_forwards_content() {
        let ev = InboundEvent::text(User::new(UserId::from("u1"), "alice"), "hello");
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["Content"], "hello");
        assert_eq!(v["User"]["ID"], "u1");
        assert!(v.get("Code").is_none());
    }

    #[test]
    fn inbound_event_without_content_defaults_empty() {
        let ev: InboundEvent =
            serde_json::from_value(json!({"User": {"ID": "u1", "Username": "a"}})).unwrap();
        assert!(ev.content.is_empty());
    }

    #[test]
    fn member_event_requires_user() {
        assert!(serde_json::from_value::<MemberEvent>(json!({})).is_err());
    }

    #[test]
    fn announcement_wire_shape() {
        let v = serde_json::to_value(SessionAnnouncement {
            id: SessionId::from("s1"),
        })
        .unwrap();
        assert_eq!(v, json!({"ID": "s1"}));
    }
}
