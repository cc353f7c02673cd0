//! Branded ID newtypes.
//!
//! Sessions, users, workspaces and gateway connections each get a distinct
//! newtype around `String`, so a user ID can never be routed as a session ID.
//!
//! Generated IDs are opaque: callers must not parse them. They are UUID v7
//! strings, which never contain the `.` subject separator.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, globally unique ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7().simple()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a collaboration session.
    SessionId, "ses"
}

branded_id! {
    /// Identifier of a user; unique across all sessions.
    UserId, "usr"
}

branded_id! {
    /// Identifier of a workspace owned by the workspace service.
    WorkspaceId, "wsp"
}

branded_id! {
    /// Identifier of a single gateway WebSocket connection.
    ConnectionId, "conn"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        assert!(SessionId::generate().starts_with("ses_"));
        assert!(UserId::generate().starts_with("usr_"));
        assert!(WorkspaceId::generate().starts_with("wsp_"));
        assert!(ConnectionId::generate().starts_with("conn_"));
    }

    #[test]
    fn generated_ids_are_single_subject_tokens() {
        for _ in 0..100 {
            let id = SessionId::generate();
            assert!(!id.contains('.'));
            assert!(!id.contains('*'));
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = SessionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: SessionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn borrows_as_str_for_map_lookups() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        let _ = map.insert(UserId::from("u1"), 1);
        assert_eq!(map.get("u1"), Some(&1));
    }

    #[test]
    fn display_matches_inner() {
        let id = UserId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
        assert_eq!(id.into_inner(), "display-me");
    }
}
