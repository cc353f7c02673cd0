//! Broadcast ingestion: `<domain>.out` subjects fanned out to local clients.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use tracing::{debug, info, warn};

use huddle_bus::{BusMessage, MessageHandler, Subscription};
use huddle_core::subjects::{Route, Subject, patterns};
use huddle_core::{Domain, Message};

use crate::context::GatewayContext;

struct Fanout {
    ctx: Arc<GatewayContext>,
}

#[async_trait]
impl MessageHandler for Fanout {
    async fn handle(&self, message: BusMessage) {
        let Some(Subject {
            session_id,
            domain,
            route: Route::Outbound,
        }) = Subject::parse(&message.subject)
        else {
            warn!(subject = %message.subject, "unexpected broadcast subject");
            return;
        };

        let entry: Message = match message.decode() {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "undecodable broadcast dropped");
                return;
            }
        };
        if domain == Domain::Chat {
            self.ctx.cache.apply_chat(&session_id, &entry);
        }

        let frame = match String::from_utf8(message.payload.to_vec()) {
            Ok(json) => Utf8Bytes::from(json),
            Err(err) => {
                warn!(error = %err, "non-UTF8 broadcast dropped");
                return;
            }
        };
        let delivered = self.ctx.registry.broadcast_to_session(&session_id, &frame);
        debug!(%session_id, %domain, id = entry.id, delivered, "broadcast fanned out");
    }
}

/// Subscriptions feeding broadcasts into the gateway.
#[derive(Debug)]
pub struct IngestHandle {
    subscriptions: Vec<Subscription>,
}

impl IngestHandle {
    /// Unsubscribe and finish in-flight fan-outs.
    pub async fn stop(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe().await;
        }
    }
}

/// Subscribe to every domain's outbound wildcard.
pub async fn start_ingest(ctx: Arc<GatewayContext>) -> huddle_bus::Result<IngestHandle> {
    let bus = ctx.bus.clone();
    let handler: Arc<dyn MessageHandler> = Arc::new(Fanout { ctx });

    let mut subscriptions = Vec::with_capacity(2);
    for domain in [Domain::Chat, Domain::Workspace] {
        subscriptions.push(bus.subscribe(&patterns::outbound(domain), handler.clone()).await?);
    }
    info!("broadcast ingestion started");
    Ok(IngestHandle { subscriptions })
}
