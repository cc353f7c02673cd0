//! Bus subject grammar.
//!
//! ```text
//! session.<sessionID>.<domain>.in                  client -> service
//! session.<sessionID>.<domain>.out                 service -> gateway broadcast
//! session.<sessionID>.<domain>.user.<userID>.new   member joins
//! session.<sessionID>.<domain>.user.<userID>.leave member leaves
//! session.new                                      session announcements
//! ```
//!
//! In subscription patterns `*` matches exactly one dot-delimited token.

use std::fmt;

use crate::ids::{SessionId, UserId};

/// Subject announcing newly created sessions.
pub const SESSION_NEW: &str = "session.new";

const ROOT: &str = "session";
const WILDCARD: &str = "*";

/// Domain owning a family of subjects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Chat membership and message log.
    Chat,
    /// Shared workspace.
    Workspace,
}

impl Domain {
    /// Subject token for this domain.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Workspace => "workspace",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "chat" => Some(Self::Chat),
            "workspace" => Some(Self::Workspace),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a subject carries within its domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Client-originated content for the service.
    Inbound,
    /// Service broadcast for the gateways.
    Outbound,
    /// A user asks to join.
    UserJoined(UserId),
    /// A user leaves.
    UserLeft(UserId),
}

/// A fully resolved, session-scoped subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    /// Session the subject belongs to.
    pub session_id: SessionId,
    /// Owning domain.
    pub domain: Domain,
    /// Direction / event type.
    pub route: Route,
}

impl Subject {
    /// `session.<sid>.<domain>.in`
    pub fn inbound(session_id: &SessionId, domain: Domain) -> Self {
        Self::new(session_id, domain, Route::Inbound)
    }

    /// `session.<sid>.<domain>.out`
    pub fn outbound(session_id: &SessionId, domain: Domain) -> Self {
        Self::new(session_id, domain, Route::Outbound)
    }

    /// `session.<sid>.<domain>.user.<uid>.new`
    pub fn user_joined(session_id: &SessionId, domain: Domain, user_id: &UserId) -> Self {
        Self::new(session_id, domain, Route::UserJoined(user_id.clone()))
    }

    /// `session.<sid>.<domain>.user.<uid>.leave`
    pub fn user_left(session_id: &SessionId, domain: Domain, user_id: &UserId) -> Self {
        Self::new(session_id, domain, Route::UserLeft(user_id.clone()))
    }

    fn new(session_id: &SessionId, domain: Domain, route: Route) -> Self {
        Self {
            session_id: session_id.clone(),
            domain,
            route,
        }
    }

    /// Parse a concrete subject. Returns `None` for anything outside the
    /// session grammar, including `session.new`.
    pub fn parse(subject: &str) -> Option<Self> {
        let tokens: Vec<&str> = subject.split('.').collect();
        if tokens.iter().any(|t| t.is_empty() || *t == WILDCARD) {
            return None;
        }
        match tokens.as_slice() {
            [ROOT, sid, domain, rest @ ..] => {
                let domain = Domain::parse(domain)?;
                let route = match rest {
                    ["in"] => Route::Inbound,
                    ["out"] => Route::Outbound,
                    ["user", uid, "new"] => Route::UserJoined(UserId::from(*uid)),
                    ["user", uid, "leave"] => Route::UserLeft(UserId::from(*uid)),
                    _ => return None,
                };
                Some(Self {
                    session_id: SessionId::from(*sid),
                    domain,
                    route,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOT}.{}.{}.", self.session_id, self.domain)?;
        match &self.route {
            Route::Inbound => f.write_str("in"),
            Route::Outbound => f.write_str("out"),
            Route::UserJoined(uid) => write!(f, "user.{uid}.new"),
            Route::UserLeft(uid) => write!(f, "user.{uid}.leave"),
        }
    }
}

/// Wildcard patterns covering every session of a domain.
pub mod patterns {
    use super::Domain;

    /// `session.*.<domain>.in`
    pub fn inbound(domain: Domain) -> String {
        format!("session.*.{domain}.in")
    }

    /// `session.*.<domain>.out`
    pub fn outbound(domain: Domain) -> String {
        format!("session.*.{domain}.out")
    }

    /// `session.*.<domain>.user.*.new`
    pub fn user_joined(domain: Domain) -> String {
        format!("session.*.{domain}.user.*.new")
    }

    /// `session.*.<domain>.user.*.leave`
    pub fn user_left(domain: Domain) -> String {
        format!("session.*.{domain}.user.*.leave")
    }
}

/// Whether `subject` matches `pattern`, where `*` stands for one token.
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pat = pattern.split('.');
    let mut sub = subject.split('.');
    loop {
        match (pat.next(), sub.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                if s.is_empty() || (p != WILDCARD && p != s) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}
