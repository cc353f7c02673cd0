//! Translation of client actions into bus publishes.

use bytes::Bytes;
use serde::Serialize;

use huddle_bus::BusError;
use huddle_core::events::{InboundEvent, MemberEvent};
use huddle_core::protocol::{ActionKind, ClientAction};
use huddle_core::{Domain, SessionId, Subject, User};

/// What the read task should do with a decoded action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Publish `payload` on `subject`.
    Publish {
        /// Concrete subject.
        subject: String,
        /// JSON payload.
        payload: Bytes,
    },
    /// Answer the requesting connection with a sync snapshot.
    Sync,
}

/// Map `action` from `user` in `session_id` to its effect.
///
/// Identity comes from the connection; IDs and tokens inside the frame are
/// ignored.
pub fn route(
    action: &ClientAction,
    user: &User,
    session_id: &SessionId,
) -> Result<Dispatch, BusError> {
    match action.kind {
        ActionKind::Message => publish(
            Subject::inbound(session_id, Domain::Chat),
            &InboundEvent::text(user.clone(), action.content.clone()),
        ),
        ActionKind::Goodbye => publish(
            Subject::user_left(session_id, Domain::Chat, &user.id),
            &member(user),
        ),
        ActionKind::Letswork => publish(
            Subject::user_joined(session_id, Domain::Workspace, &user.id),
            &member(user),
        ),
        ActionKind::Letsfinish => publish(
            Subject::user_left(session_id, Domain::Workspace, &user.id),
            &member(user),
        ),
        ActionKind::Update => publish(
            Subject::inbound(session_id, Domain::Workspace),
            &InboundEvent {
                user: user.clone(),
                content: action.content.clone(),
                code: action.code.clone(),
                schema: action.schema.clone(),
            },
        ),
        ActionKind::Sync => Ok(Dispatch::Sync),
    }
}

/// The publish performed when a connection is installed.
pub fn chat_join(user: &User, session_id: &SessionId) -> Result<Dispatch, BusError> {
    publish(
        Subject::user_joined(session_id, Domain::Chat, &user.id),
        &member(user),
    )
}

fn member(user: &User) -> MemberEvent {
    MemberEvent { user: user.clone() }
}

fn publish<T: Serialize>(subject: Subject, payload: &T) -> Result<Dispatch, BusError> {
    let payload = serde_json::to_vec(payload).map_err(BusError::Encode)?;
    Ok(Dispatch::Publish {
        subject: subject.to_string(),
        payload: Bytes::from(payload),
    })
}
