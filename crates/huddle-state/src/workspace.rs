//! Shared workspace: membership, an update log, and the latest code and
//! schema snapshots.

use huddle_core::events::InboundEvent;
use huddle_core::{Domain, Message, MessageKind, SessionId, User, WorkspaceId};

use crate::domain::SessionDomain;

/// The workspace domain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Workspace;

/// Per-session workspace state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceState {
    /// Generated when the session's workspace is created.
    pub id: WorkspaceId,
    /// Owning session.
    pub session_id: SessionId,
    /// Latest code snapshot.
    pub code: String,
    /// Latest schema snapshot.
    pub schema: String,
}

impl SessionDomain for Workspace {
    type Extra = WorkspaceState;

    fn domain(&self) -> Domain {
        Domain::Workspace
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Workspace
    }

    fn create(&self, session_id: &SessionId) -> WorkspaceState {
        WorkspaceState {
            id: WorkspaceId::generate(),
            session_id: session_id.clone(),
            code: String::new(),
            schema: String::new(),
        }
    }

    fn arrival_text(&self, ws: &WorkspaceState, user: &User, created: bool) -> String {
        if created {
            format!("Workspace [{}] created for session [{}].", ws.id, ws.session_id)
        } else {
            format!("User {} has entered the workspace [{}].", user.display_name, ws.id)
        }
    }

    fn departure_text(&self, ws: &WorkspaceState, user: &User) -> String {
        format!("User {} has left the workspace [{}].", user.display_name, ws.id)
    }

    fn apply(&self, ws: &mut WorkspaceState, event: &InboundEvent, entry: &mut Message) {
        if let Some(code) = &event.code {
            ws.code.clone_from(code);
        }
        if let Some(schema) = &event.schema {
            ws.schema.clone_from(schema);
        }
        entry.code = Some(ws.code.clone());
        entry.schema = Some(ws.schema.clone());
    }
}
