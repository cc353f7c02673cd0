//! Live connections grouped by session.
//!
//! Only connect and disconnect mutate the registry; bus callbacks take the
//! read lock to fan out.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use parking_lot::RwLock;
use tracing::debug;

use huddle_core::{ConnectionId, SessionId};

use super::connection::ClientConnection;

type SessionClients = HashMap<ConnectionId, Arc<ClientConnection>>;

/// Per-session client registry.
#[derive(Default)]
pub struct ClientRegistry {
    sessions: RwLock<HashMap<SessionId, SessionClients>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its session.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut sessions = self.sessions.write();
        let _ = sessions
            .entry(connection.session_id.clone())
            .or_default()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection. Empty sessions are dropped.
    pub fn remove(&self, session_id: &SessionId, connection_id: &ConnectionId) -> bool {
        let mut sessions = self.sessions.write();
        let Some(clients) = sessions.get_mut(session_id) else {
            return false;
        };
        let removed = clients.remove(connection_id).is_some();
        if clients.is_empty() {
            let _ = sessions.remove(session_id);
        }
        removed
    }

    /// Enqueue `frame` on every connection of `session_id`.
    ///
    /// Never blocks; returns how many connections accepted the frame.
    pub fn broadcast_to_session(&self, session_id: &SessionId, frame: &Utf8Bytes) -> usize {
        let sessions = self.sessions.read();
        let Some(clients) = sessions.get(session_id) else {
            return 0;
        };
        let delivered = clients.values().filter(|c| c.send(frame.clone())).count();
        debug!(%session_id, recipients = clients.len(), delivered, "broadcast to session");
        delivered
    }

    /// Whether `session_id` has at least one live connection.
    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Total live connections.
    pub fn connection_count(&self) -> usize {
        self.sessions.read().values().map(HashMap::len).sum()
    }

    /// Sessions with at least one connection.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Close every connection. Their sessions deregister them as they exit.
    pub fn close_all(&self) -> usize {
        let sessions = self.sessions.read();
        sessions
            .values()
            .flat_map(HashMap::values)
            .filter(|c| c.close())
            .count()
    }
}
