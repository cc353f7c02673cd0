//! Session provisioning: `POST /session/new` and one-time connect tokens.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, gauge};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use huddle_bus::{Bus, publish_json};
use huddle_core::events::SessionAnnouncement;
use huddle_core::subjects::SESSION_NEW;
use huddle_core::{SessionId, User, UserId};

use crate::errors::GatewayError;
use crate::metrics::{PENDING_TOKENS, SESSIONS_CREATED_TOTAL, TOKENS_EXPIRED_TOTAL};

const TOKEN_LEN: usize = 32;

/// A user waiting for their WebSocket upgrade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUser {
    /// The provisioned user.
    pub user: User,
    /// Session the user joins on connect.
    pub session_id: SessionId,
}

/// Response body of `POST /session/new`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Ticket {
    /// One-time token for `/ws?token=`.
    #[serde(rename = "Token")]
    pub token: String,
    /// Session joined or created.
    #[serde(rename = "SessionID")]
    pub session_id: SessionId,
    /// Newly allocated user ID.
    #[serde(rename = "UserID")]
    pub user_id: UserId,
}

#[derive(Debug)]
struct PendingEntry {
    pending: PendingUser,
    issued_at: Instant,
}

/// Allocates sessions, users and connect tokens.
///
/// Tokens expire `token_ttl` after issue. Sessions are remembered by their
/// last provisioning time so idle ones can be forgotten.
pub struct Provisioner {
    bus: Arc<dyn Bus>,
    token_ttl: Duration,
    sessions: DashMap<SessionId, Instant>,
    pending: DashMap<String, PendingEntry>,
}

impl Provisioner {
    /// Create a provisioner announcing new sessions on `bus`.
    pub fn new(bus: Arc<dyn Bus>, token_ttl: Duration) -> Self {
        Self {
            bus,
            token_ttl,
            sessions: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Register a pending user in `session_id`, or in a fresh session when
    /// the ID is absent or unknown to this gateway.
    #[instrument(skip(self))]
    pub async fn create_or_join(
        &self,
        username: &str,
        session_id: Option<&str>,
    ) -> Result<Ticket, GatewayError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(GatewayError::BadRequest("Username must not be empty".into()));
        }
        let _ = self.expire_tokens();

        let known = session_id
            .map(SessionId::from)
            .filter(|sid| self.knows_session(sid));
        let session_id = match known {
            Some(sid) => sid,
            None => {
                let sid = SessionId::generate();
                publish_json(
                    self.bus.as_ref(),
                    SESSION_NEW,
                    &SessionAnnouncement { id: sid.clone() },
                )
                .await?;
                counter!(SESSIONS_CREATED_TOTAL).increment(1);
                info!(session_id = %sid, "session created");
                sid
            }
        };
        let now = Instant::now();
        let _ = self.sessions.insert(session_id.clone(), now);

        let user = User::new(UserId::generate(), username);
        let token = generate_token();
        let ticket = Ticket {
            token: token.clone(),
            session_id: session_id.clone(),
            user_id: user.id.clone(),
        };
        info!(session_id = %session_id, user_id = %user.id, "user provisioned");
        let _ = self.pending.insert(
            token,
            PendingEntry {
                pending: PendingUser { user, session_id },
                issued_at: now,
            },
        );
        self.record_pending();
        Ok(ticket)
    }

    /// Whether `token` is waiting to be claimed. An expired token is
    /// evicted here and reported as not pending.
    pub fn is_pending(&self, token: &str) -> bool {
        let expired = self
            .pending
            .remove_if(token, |_, entry| !self.is_fresh(entry.issued_at));
        if expired.is_some() {
            counter!(TOKENS_EXPIRED_TOTAL).increment(1);
            self.record_pending();
            return false;
        }
        self.pending.contains_key(token)
    }

    /// Take the pending user for `token`. A token can be claimed once, and
    /// only within its TTL.
    pub fn claim(&self, token: &str) -> Option<PendingUser> {
        let (_, entry) = self.pending.remove(token)?;
        self.record_pending();
        if self.is_fresh(entry.issued_at) {
            Some(entry.pending)
        } else {
            counter!(TOKENS_EXPIRED_TOTAL).increment(1);
            None
        }
    }

    /// Whether this gateway created `session_id` and still remembers it.
    pub fn knows_session(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Tokens issued but not yet claimed, expired ones included until swept.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every token older than the TTL. Returns how many were dropped.
    pub fn expire_tokens(&self) -> usize {
        let mut expired = 0;
        self.pending.retain(|_, entry| {
            let fresh = self.is_fresh(entry.issued_at);
            if !fresh {
                expired += 1;
            }
            fresh
        });
        if expired > 0 {
            counter!(TOKENS_EXPIRED_TOTAL).increment(expired as u64);
            debug!(expired, "connect tokens expired");
            self.record_pending();
        }
        expired
    }

    /// Forget sessions with no provisioning activity within the TTL for
    /// which `is_live` is false. Returns the forgotten IDs.
    pub fn forget_idle_sessions(&self, is_live: impl Fn(&SessionId) -> bool) -> Vec<SessionId> {
        let mut forgotten = Vec::new();
        self.sessions.retain(|sid, last_active| {
            let keep = last_active.elapsed() < self.token_ttl || is_live(sid);
            if !keep {
                forgotten.push(sid.clone());
            }
            keep
        });
        forgotten
    }

    fn is_fresh(&self, issued_at: Instant) -> bool {
        issued_at.elapsed() < self.token_ttl
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_pending(&self) {
        gauge!(PENDING_TOKENS).set(self.pending_count() as f64);
    }
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
