//! Read-side cache of chat state, rebuilt from `chat.out` broadcasts.
//!
//! The roster is derived from `Notice` markers on system messages; the chat
//! log is every chat broadcast in arrival order. The cache answers `sync`
//! requests and is never authoritative.

use dashmap::DashMap;

use huddle_core::protocol::SyncMessage;
use huddle_core::{Message, Notice, SessionId, User};

#[derive(Debug, Default)]
struct CachedSession {
    users: Vec<User>,
    chat: Vec<Message>,
}

/// Per-session chat cache.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: DashMap<SessionId, CachedSession>,
}

impl SessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chat broadcast into the cache.
    pub fn apply_chat(&self, session_id: &SessionId, message: &Message) {
        let mut session = self.sessions.entry(session_id.clone()).or_default();
        if let (Some(notice), Some(user)) = (message.notice, message.user.as_ref()) {
            match notice {
                Notice::Joined => {
                    if !session.users.iter().any(|u| u.id == user.id) {
                        session.users.push(user.clone());
                    }
                }
                Notice::Left => session.users.retain(|u| u.id != user.id),
            }
        }
        session.chat.push(message.clone());
    }

    /// Snapshot of `session_id` as a sync frame. Unknown sessions yield an
    /// empty snapshot.
    pub fn sync(&self, session_id: &SessionId) -> SyncMessage {
        let (users, chat) = self
            .sessions
            .get(session_id)
            .map(|s| (s.users.clone(), s.chat.clone()))
            .unwrap_or_default();
        SyncMessage::new(session_id.clone(), users, chat)
    }

    /// Drop everything cached for `session_id`.
    pub fn forget(&self, session_id: &SessionId) {
        let _ = self.sessions.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{MessageKind, UserId};

    fn alice() -> User {
        User::new(UserId::from("u1"), "alice")
    }

    #[test]
    fn roster_follows_notices() {
        let cache = SessionCache::new();
        let sid = SessionId::from("s1");
        cache.apply_chat(&sid, &Message::notice(0, alice(), Notice::Joined, "in"));
        cache.apply_chat(&sid, &Message::authored(1, alice(), MessageKind::Message, "hello"));

        let sync = cache.sync(&sid);
        assert_eq!(sync.users, vec![alice()]);
        assert_eq!(sync.chat.len(), 2);
        assert_eq!(sync.chat[1].content, "hello");

        cache.apply_chat(&sid, &Message::notice(2, alice(), Notice::Left, "out"));
        let sync = cache.sync(&sid);
        assert!(sync.users.is_empty());
        assert_eq!(sync.chat.len(), 3);
    }

    #[test]
    fn duplicate_join_notice_keeps_one_entry() {
        let cache = SessionCache::new();
        let sid = SessionId::from("s1");
        cache.apply_chat(&sid, &Message::notice(0, alice(), Notice::Joined, "in"));
        cache.apply_chat(&sid, &Message::notice(1, alice(), Notice::Joined, "in"));
        assert_eq!(cache.sync(&sid).users.len(), 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let cache = SessionCache::new();
        cache.apply_chat(
            &SessionId::from("s1"),
            &Message::notice(0, alice(), Notice::Joined, "in"),
        );
        let other = cache.sync(&SessionId::from("s2"));
        assert_eq!(other.session_id.as_str(), "s2");
        assert!(other.users.is_empty());
        assert!(other.chat.is_empty());
        assert_eq!(other.kind, "sync");
    }

    #[test]
    fn forget_clears_one_session() {
        let cache = SessionCache::new();
        let (s1, s2) = (SessionId::from("s1"), SessionId::from("s2"));
        cache.apply_chat(&s1, &Message::notice(0, alice(), Notice::Joined, "in"));
        cache.apply_chat(&s2, &Message::notice(0, alice(), Notice::Joined, "in"));

        cache.forget(&s1);
        assert!(cache.sync(&s1).chat.is_empty());
        assert_eq!(cache.sync(&s2).chat.len(), 1);
    }
}
