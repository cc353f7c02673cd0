//! Chat: membership plus a message log, nothing else.

use huddle_core::{Domain, MessageKind, SessionId, User};

use crate::domain::SessionDomain;

/// The chat domain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Chat;

impl SessionDomain for Chat {
    type Extra = ();

    fn domain(&self) -> Domain {
        Domain::Chat
    }

    fn message_kind(&self) -> MessageKind {
        MessageKind::Message
    }

    fn create(&self, _session_id: &SessionId) {}

    fn arrival_text(&self, _extra: &(), user: &User, _created: bool) -> String {
        format!("User {} has entered the workspace.", user.display_name)
    }

    fn departure_text(&self, _extra: &(), user: &User) -> String {
        format!("User {} has left the workspace.", user.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::UserId;

    #[test]
    fn notices_name_the_user() {
        let bob = User::new(UserId::from("u2"), "bob");
        assert_eq!(
            Chat.arrival_text(&(), &bob, true),
            "User bob has entered the workspace."
        );
        assert_eq!(Chat.departure_text(&(), &bob), "User bob has left the workspace.");
    }
}
