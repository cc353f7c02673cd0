//! WebSocket client connection state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use huddle_core::{ConnectionId, SessionId, User};

use crate::metrics::WS_QUEUE_DROPS_TOTAL;

/// A connected client.
///
/// The outbound queue has exactly one sender, owned here, and one receiver,
/// owned by the connection's write task. [`ClientConnection::close`] drops
/// the sender, which the write task observes as end of queue.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// The authenticated user.
    pub user: User,
    /// Session this connection belongs to.
    pub session_id: SessionId,
    /// When the upgrade completed.
    pub connected_at: Instant,
    tx: Mutex<Option<mpsc::Sender<Utf8Bytes>>>,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a connection around the sending half of its queue.
    pub fn new(
        id: ConnectionId,
        user: User,
        session_id: SessionId,
        tx: mpsc::Sender<Utf8Bytes>,
        cancel: CancellationToken,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            user,
            session_id,
            connected_at: now,
            tx: Mutex::new(Some(tx)),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            cancel,
        }
    }

    /// Enqueue a frame without waiting.
    ///
    /// Returns `false` when the queue is full (the frame is dropped and
    /// counted) or already closed.
    pub fn send(&self, frame: Utf8Bytes) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                counter!(WS_QUEUE_DROPS_TOTAL).increment(1);
                warn!(conn_id = %self.id, session_id = %self.session_id, "outbound queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a Pong.
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last Pong, or since connect if none arrived yet.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Token cancelled when the connection is torn down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Close the queue and cancel both tasks. Only the first call has an
    /// effect; returns whether this call did the work.
    pub fn close(&self) -> bool {
        let closed = self.tx.lock().take().is_some();
        self.cancel.cancel();
        closed
    }

    /// Whether [`Self::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user", &self.user.id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
