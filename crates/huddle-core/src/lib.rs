//! # huddle-core
//!
//! Shared vocabulary for every huddle crate:
//!
//! - **Branded IDs**: `SessionId`, `UserId`, `WorkspaceId`, `ConnectionId`
//! - **Session model**: `User`, `Message`, `MessageKind`, `Notice`
//! - **Bus payloads**: membership and inbound events exchanged with the state services
//! - **Wire protocol**: client actions and sync snapshots carried over WebSocket
//! - **Subjects**: the `session.<id>.<domain>.<rest>` routing grammar and wildcard matching
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod subjects;

pub use ids::{ConnectionId, SessionId, UserId, WorkspaceId};
pub use model::{Message, MessageKind, Notice, User};
pub use subjects::{Domain, Route, Subject};
