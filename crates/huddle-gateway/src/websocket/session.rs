//! WebSocket session lifecycle: one connected client from upgrade through
//! teardown.
//!
//! Two tasks per connection. The write task is the only writer: it drains
//! the outbound queue and sends keepalive Pings. The read task decodes
//! client actions under a read deadline that only a Pong refreshes.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use huddle_core::ConnectionId;
use huddle_core::protocol::ClientAction;

use super::actions::{self, Dispatch};
use super::connection::ClientConnection;
use crate::context::GatewayContext;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::provisioning::PendingUser;

/// Run a WebSocket session for a client whose token was just claimed.
///
/// 1. Registers the connection under its session
/// 2. Publishes the chat join for the user
/// 3. Runs the write task and the read loop until either ends
/// 4. Tears down: closes the queue, waits for the writer, deregisters
#[instrument(skip_all, fields(session_id = %pending.session_id, user_id = %pending.user.id))]
pub async fn run_ws_session(socket: WebSocket, pending: PendingUser, ctx: Arc<GatewayContext>) {
    let PendingUser { user, session_id } = pending;
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(ctx.config.queue_capacity);
    let connection = Arc::new(ClientConnection::new(
        ConnectionId::generate(),
        user,
        session_id,
        tx,
        ctx.shutdown.connection_token(),
    ));

    ctx.registry.add(connection.clone());
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(conn_id = %connection.id, "client connected");

    match actions::chat_join(&connection.user, &connection.session_id) {
        Ok(join) => dispatch(join, &connection, &ctx).await,
        Err(err) => warn!(error = %err, "failed to encode chat join"),
    }

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(
        sink,
        rx,
        connection.clone(),
        ctx.config.write_wait,
        ctx.config.ping_period(),
    ));

    read_loop(stream, &connection, &ctx).await;

    let _ = connection.close();
    if let Err(err) = writer.await {
        warn!(error = %err, "write task failed");
    }
    let _ = ctx.registry.remove(&connection.session_id, &connection.id);
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(
        conn_id = %connection.id,
        dropped = connection.drop_count(),
        duration_ms = u64::try_from(connection.connected_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
}

async fn write_loop<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    connection: Arc<ClientConnection>,
    write_wait: Duration,
    ping_period: Duration,
) where
    S: Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(text) = frame else {
                    let _ = write(&mut sink, Message::Close(None), write_wait).await;
                    break;
                };
                if !write(&mut sink, Message::Text(text), write_wait).await {
                    debug!(conn_id = %connection.id, "write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if !write(&mut sink, Message::Ping(Bytes::new()), write_wait).await {
                    warn!(conn_id = %connection.id, "keepalive ping failed");
                    break;
                }
            }
        }
    }

    // Wakes the read loop when the writer is the side that failed.
    let _ = connection.close();
}

async fn write<S>(sink: &mut S, message: Message, write_wait: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(
        tokio::time::timeout(write_wait, sink.send(message)).await,
        Ok(Ok(()))
    )
}

async fn read_loop<St, E>(mut stream: St, connection: &ClientConnection, ctx: &GatewayContext)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let pong_wait = ctx.config.pong_wait;
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            () = connection.cancel_token().cancelled() => {
                debug!(conn_id = %connection.id, "connection cancelled");
                break;
            }
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => {
                warn!(
                    conn_id = %connection.id,
                    since_pong_ms = u64::try_from(connection.last_pong_elapsed().as_millis()).unwrap_or(u64::MAX),
                    "read deadline passed without pong, closing"
                );
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(conn_id = %connection.id, error = %err, "read failed");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => handle_text(text.as_str(), connection, ctx).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => handle_text(text, connection, ctx).await,
                Err(_) => warn!(conn_id = %connection.id, len = data.len(), "non-UTF8 binary frame dropped"),
            },
            Message::Pong(_) => {
                connection.mark_alive();
                deadline = Instant::now() + pong_wait;
            }
            Message::Ping(_) => {}
            Message::Close(_) => {
                info!(conn_id = %connection.id, "client sent close frame");
                break;
            }
        }
    }
}

async fn handle_text(text: &str, connection: &ClientConnection, ctx: &GatewayContext) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(err) => {
            warn!(conn_id = %connection.id, error = %err, "undecodable client frame dropped");
            return;
        }
    };
    debug!(conn_id = %connection.id, kind = ?action.kind, "client action");

    match actions::route(&action, &connection.user, &connection.session_id) {
        Ok(dispatch_to) => dispatch(dispatch_to, connection, ctx).await,
        Err(err) => warn!(conn_id = %connection.id, error = %err, "failed to encode client action"),
    }
}

async fn dispatch(dispatch: Dispatch, connection: &ClientConnection, ctx: &GatewayContext) {
    match dispatch {
        Dispatch::Publish { subject, payload } => {
            if let Err(err) = ctx.bus.publish(&subject, payload).await {
                warn!(conn_id = %connection.id, %subject, error = %err, "publish failed");
            }
        }
        Dispatch::Sync => {
            let snapshot = ctx.cache.sync(&connection.session_id);
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    let _ = connection.send(Utf8Bytes::from(json));
                }
                Err(err) => warn!(conn_id = %connection.id, error = %err, "failed to encode sync"),
            }
        }
    }
}
