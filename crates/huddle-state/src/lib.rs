//! # huddle-state
//!
//! Authoritative, in-memory session state behind the bus.
//!
//! One generic [`SessionStateService`] owns membership and an ordered log
//! per session. A [`SessionDomain`] plugs in the domain specifics; two ship
//! here, [`Chat`] and [`Workspace`]. [`start`] subscribes a service to its
//! domain's join, leave and inbound subjects and returns a [`ServiceHandle`]
//! used to stop it during shutdown.

#![deny(unsafe_code)]

pub mod chat;
pub mod domain;
pub mod errors;
pub mod service;
pub mod workspace;

pub use chat::Chat;
pub use domain::SessionDomain;
pub use errors::{Result, StateError};
pub use service::{ServiceHandle, SessionSnapshot, SessionStateService, start};
pub use workspace::{Workspace, WorkspaceState};

/// Chat state service.
pub type ChatService = SessionStateService<Chat>;

/// Workspace state service.
pub type WorkspaceService = SessionStateService<Workspace>;
