//! Generic session state service.
//!
//! Sessions are created lazily on the first join. Every operation on a
//! session runs under that session's async mutex, and the broadcast is
//! published before the mutex is released, so the order of `<domain>.out`
//! publishes equals log order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use huddle_bus::{Bus, BusMessage, MessageHandler, Subscription, publish_json};
use huddle_core::events::{InboundEvent, MemberEvent};
use huddle_core::subjects::{self, Route, Subject};
use huddle_core::{Message, Notice, SessionId, User, UserId};

use crate::domain::SessionDomain;
use crate::errors::{Result, StateError};

/// Authoritative state of one session.
#[derive(Debug)]
pub struct SessionState<E> {
    members: HashMap<UserId, User>,
    log: Vec<Message>,
    extra: E,
}

impl<E> SessionState<E> {
    fn new(extra: E) -> Self {
        Self {
            members: HashMap::new(),
            log: Vec::new(),
            extra,
        }
    }

    fn next_id(&self) -> u64 {
        self.log.len() as u64
    }
}

/// Point-in-time copy of a session.
#[derive(Clone, Debug)]
pub struct SessionSnapshot<E> {
    /// Members sorted by user ID.
    pub members: Vec<User>,
    /// The full log.
    pub log: Vec<Message>,
    /// Domain extras.
    pub extra: E,
}

/// State service for one domain.
pub struct SessionStateService<D: SessionDomain> {
    domain: D,
    bus: Arc<dyn Bus>,
    sessions: DashMap<SessionId, Arc<Mutex<SessionState<D::Extra>>>>,
}

impl<D: SessionDomain> SessionStateService<D> {
    /// Create a service publishing its broadcasts on `bus`.
    pub fn new(domain: D, bus: Arc<dyn Bus>) -> Self {
        Self {
            domain,
            bus,
            sessions: DashMap::new(),
        }
    }

    /// Number of sessions this service owns.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, session_id: &SessionId) -> Option<Arc<Mutex<SessionState<D::Extra>>>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Add `user` to the session, creating the session if needed.
    ///
    /// Returns the arrival notice, or `None` when the user was already a
    /// member.
    #[instrument(skip(self, user), fields(domain = %self.domain.domain(), session_id = %session_id, user_id = %user.id))]
    pub async fn on_join(&self, session_id: &SessionId, user: User) -> Result<Option<Message>> {
        let (session, created) = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let state = SessionState::new(self.domain.create(session_id));
                (e.insert(Arc::new(Mutex::new(state))).value().clone(), true)
            }
        };
        if created {
            info!("session created");
        }

        let mut state = session.lock().await;
        if state.members.contains_key(&user.id) {
            debug!("already a member");
            return Ok(None);
        }

        let text = self.domain.arrival_text(&state.extra, &user, created);
        let entry = Message::notice(state.next_id(), user.clone(), Notice::Joined, text);
        let _ = state.members.insert(user.id.clone(), user);
        state.log.push(entry.clone());
        self.broadcast(session_id, &entry).await?;
        Ok(Some(entry))
    }

    /// Remove `user` from the session.
    #[instrument(skip(self, user), fields(domain = %self.domain.domain(), session_id = %session_id, user_id = %user.id))]
    pub async fn on_leave(&self, session_id: &SessionId, user: &User) -> Result<Message> {
        let session = self
            .session(session_id)
            .ok_or_else(|| StateError::UnknownSession(session_id.clone()))?;

        let mut state = session.lock().await;
        let Some(member) = state.members.remove(&user.id) else {
            return Err(StateError::UnknownUser {
                session_id: session_id.clone(),
                user_id: user.id.clone(),
            });
        };

        let text = self.domain.departure_text(&state.extra, &member);
        let entry = Message::notice(state.next_id(), member, Notice::Left, text);
        state.log.push(entry.clone());
        self.broadcast(session_id, &entry).await?;
        Ok(entry)
    }

    /// Append a user-authored entry.
    ///
    /// The author recorded is the stored member, not the payload's copy.
    #[instrument(skip(self, event), fields(domain = %self.domain.domain(), session_id = %session_id, user_id = %event.user.id))]
    pub async fn on_message(&self, session_id: &SessionId, event: &InboundEvent) -> Result<Message> {
        let session = self
            .session(session_id)
            .ok_or_else(|| StateError::UnknownSession(session_id.clone()))?;

        let mut state = session.lock().await;
        let Some(author) = state.members.get(&event.user.id).cloned() else {
            return Err(StateError::UnknownUser {
                session_id: session_id.clone(),
                user_id: event.user.id.clone(),
            });
        };

        let mut entry = Message::authored(
            state.next_id(),
            author,
            self.domain.message_kind(),
            event.content.clone(),
        );
        let SessionState { extra, log, .. } = &mut *state;
        self.domain.apply(extra, event, &mut entry);
        log.push(entry.clone());
        self.broadcast(session_id, &entry).await?;
        Ok(entry)
    }

    async fn broadcast(&self, session_id: &SessionId, entry: &Message) -> Result<()> {
        let subject = Subject::outbound(session_id, self.domain.domain()).to_string();
        publish_json(self.bus.as_ref(), &subject, entry).await?;
        Ok(())
    }

    /// Route one bus delivery to the matching operation.
    pub async fn dispatch(&self, message: &BusMessage) -> Result<Option<Message>> {
        let subject = Subject::parse(&message.subject)
            .filter(|s| s.domain == self.domain.domain())
            .ok_or_else(|| StateError::UnexpectedSubject(message.subject.clone()))?;

        match subject.route {
            Route::UserJoined(uid) => {
                let event: MemberEvent = message.decode()?;
                ensure_same_user(uid, &event.user)?;
                self.on_join(&subject.session_id, event.user).await
            }
            Route::UserLeft(uid) => {
                let event: MemberEvent = message.decode()?;
                ensure_same_user(uid, &event.user)?;
                self.on_leave(&subject.session_id, &event.user).await.map(Some)
            }
            Route::Inbound => {
                let event: InboundEvent = message.decode()?;
                self.on_message(&subject.session_id, &event).await.map(Some)
            }
            Route::Outbound => Err(StateError::UnexpectedSubject(message.subject.clone())),
        }
    }
}

impl<D> SessionStateService<D>
where
    D: SessionDomain,
    D::Extra: Clone,
{
    /// Copy the current state of a session.
    pub async fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot<D::Extra>> {
        let session = self.session(session_id)?;
        let state = session.lock().await;
        let mut members: Vec<User> = state.members.values().cloned().collect();
        members.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Some(SessionSnapshot {
            members,
            log: state.log.clone(),
            extra: state.extra.clone(),
        })
    }
}

fn ensure_same_user(subject: UserId, user: &User) -> Result<()> {
    if subject == user.id {
        Ok(())
    } else {
        Err(StateError::UserMismatch {
            subject,
            payload: user.id.clone(),
        })
    }
}

struct Ingest<D: SessionDomain> {
    service: Arc<SessionStateService<D>>,
}

#[async_trait]
impl<D: SessionDomain> MessageHandler for Ingest<D> {
    async fn handle(&self, message: BusMessage) {
        if let Err(err) = self.service.dispatch(&message).await {
            let domain = self.service.domain.domain().as_str();
            counter!("state_events_rejected_total", "domain" => domain).increment(1);
            warn!(domain, subject = %message.subject, error = %err, "event dropped");
        }
    }
}

/// Running subscriptions of a started service.
#[derive(Debug)]
pub struct ServiceHandle {
    subscriptions: Vec<Subscription>,
}

impl ServiceHandle {
    /// Unsubscribe and wait for in-flight events to finish.
    pub async fn stop(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe().await;
        }
    }
}

/// Subscribe `service` to its domain's join, leave and inbound subjects.
pub async fn start<D: SessionDomain>(
    service: Arc<SessionStateService<D>>,
) -> huddle_bus::Result<ServiceHandle> {
    let domain = service.domain.domain();
    let bus = service.bus.clone();
    let handler: Arc<dyn MessageHandler> = Arc::new(Ingest { service });

    let mut subscriptions = Vec::with_capacity(3);
    for pattern in [
        subjects::patterns::user_joined(domain),
        subjects::patterns::user_left(domain),
        subjects::patterns::inbound(domain),
    ] {
        subscriptions.push(bus.subscribe(&pattern, handler.clone()).await?);
    }
    info!(%domain, "state service started");
    Ok(ServiceHandle { subscriptions })
}
