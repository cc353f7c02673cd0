//! The seam between the generic state service and a concrete domain.

use huddle_core::events::InboundEvent;
use huddle_core::{Domain, Message, MessageKind, SessionId, User};

/// A family of session state owned by one service.
///
/// The service handles membership, ordering and publishing; the domain
/// supplies its per-session extras and the wording of system messages.
pub trait SessionDomain: Send + Sync + 'static {
    /// Domain-specific per-session state.
    type Extra: Send + 'static;

    /// Subject domain this service listens on and publishes to.
    fn domain(&self) -> Domain;

    /// Kind given to user-authored log entries.
    fn message_kind(&self) -> MessageKind;

    /// Fresh extras for a session seen for the first time.
    fn create(&self, session_id: &SessionId) -> Self::Extra;

    /// Text of the arrival notice. `created` is true for the join that
    /// created the session.
    fn arrival_text(&self, extra: &Self::Extra, user: &User, created: bool) -> String;

    /// Text of the departure notice.
    fn departure_text(&self, extra: &Self::Extra, user: &User) -> String;

    /// Fold an inbound event into the extras and decorate the entry about to
    /// be appended.
    fn apply(&self, _extra: &mut Self::Extra, _event: &InboundEvent, _entry: &mut Message) {}
}
