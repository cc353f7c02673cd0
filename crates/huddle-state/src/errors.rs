//! State service error types.
//!
//! None of these cross the bus: the ingestion handler logs them, counts them
//! and drops the offending event.

use huddle_bus::BusError;
use huddle_core::{SessionId, UserId};
use thiserror::Error;

/// Reasons an event was rejected.
#[derive(Debug, Error)]
pub enum StateError {
    /// No state exists for the session.
    #[error("session {0} is not registered")]
    UnknownSession(SessionId),

    /// The user is not a member of the session.
    #[error("user {user_id} is not registered in session {session_id}")]
    UnknownUser {
        /// Session the event targeted.
        session_id: SessionId,
        /// User the event named.
        user_id: UserId,
    },

    /// The subject is outside this service's domain or grammar.
    #[error("unexpected subject: {0}")]
    UnexpectedSubject(String),

    /// The subject names a different user than the payload.
    #[error("subject user {subject} does not match payload user {payload}")]
    UserMismatch {
        /// User ID from the subject.
        subject: UserId,
        /// User ID from the payload.
        payload: UserId,
    },

    /// Payload decode or broadcast publish failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_display() {
        let err = StateError::UnknownUser {
            session_id: SessionId::from("s1"),
            user_id: UserId::from("u9"),
        };
        assert_eq!(err.to_string(), "user u9 is not registered in session s1");
    }

    #[test]
    fn bus_errors_convert() {
        let err: StateError = BusError::Closed.into();
        assert!(matches!(err, StateError::Bus(BusError::Closed)));
        assert_eq!(err.to_string(), "bus is closed");
    }
}
