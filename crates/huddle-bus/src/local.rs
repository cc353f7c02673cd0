//! In-process bus.
//!
//! Each subscription owns a bounded queue drained by a dedicated dispatcher
//! task, which gives sequential, in-order callbacks per subscription and
//! concurrency across subscriptions. A publish that finds a queue full drops
//! the message for that subscriber only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use huddle_core::subjects;

use crate::bus::{Bus, BusMessage, MessageHandler, Subscription};
use crate::errors::{BusError, Result};

struct Route {
    id: u64,
    pattern: String,
    tx: mpsc::Sender<BusMessage>,
}

#[derive(Default)]
struct Routes {
    entries: RwLock<Vec<Route>>,
}

impl Routes {
    fn remove(&self, id: u64) {
        self.entries.write().retain(|r| r.id != id);
    }
}

/// In-process [`Bus`] implementation.
pub struct LocalBus {
    routes: Arc<Routes>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

impl LocalBus {
    /// Create a bus whose subscriptions queue at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            routes: Arc::new(Routes::default()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.routes.entries.read().len()
    }
}

fn validate(subject: &str, allow_wildcard: bool) -> Result<()> {
    let valid = subject
        .split('.')
        .all(|t| !t.is_empty() && (allow_wildcard || t != "*"));
    if valid {
        Ok(())
    } else {
        Err(BusError::InvalidSubject(subject.to_owned()))
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        validate(subject, false)?;
        counter!("bus_messages_published_total").increment(1);

        let routes = self.routes.entries.read();
        for route in routes.iter().filter(|r| subjects::matches(&r.pattern, subject)) {
            let message = BusMessage {
                subject: subject.to_owned(),
                payload: payload.clone(),
            };
            match route.tx.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counter!("bus_messages_dropped_total").increment(1);
                    warn!(subject, pattern = %route.pattern, "subscription queue full, dropping message");
                }
                // Dispatcher already gone; the route is about to be removed.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        validate(pattern, true)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::channel::<BusMessage>(self.capacity);
        self.routes.entries.write().push(Route {
            id,
            pattern: pattern.to_owned(),
            tx,
        });
        debug!(pattern, id, "subscription added");

        let dispatcher = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                handler.handle(message).await;
            }
        });

        let routes = self.routes.clone();
        Ok(Subscription::new(pattern, move || routes.remove(id), dispatcher))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let dropped = std::mem::take(&mut *self.routes.entries.write());
        debug!(subscriptions = dropped.len(), "bus closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{handler_fn, publish_json};
    use std::time::Duration;
    use tokio::sync::{Notify, oneshot};

    fn collector() -> (Arc<dyn MessageHandler>, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |m| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(m);
            }
        });
        (handler, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<BusMessage>) -> BusMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn wildcard_subscription_receives_matching_subjects() {
        let bus = LocalBus::new(16);
        let (handler, mut rx) = collector();
        let _sub = bus.subscribe("session.*.chat.out", handler).await.unwrap();

        bus.publish("session.a.chat.out", Bytes::from_static(b"1")).await.unwrap();
        bus.publish("session.a.workspace.out", Bytes::from_static(b"2")).await.unwrap();
        bus.publish("session.b.chat.out", Bytes::from_static(b"3")).await.unwrap();

        assert_eq!(next(&mut rx).await.subject, "session.a.chat.out");
        assert_eq!(next(&mut rx).await.subject, "session.b.chat.out");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_matching_subscription_gets_a_copy() {
        let bus = LocalBus::new(16);
        let (h1, mut rx1) = collector();
        let (h2, mut rx2) = collector();
        let _s1 = bus.subscribe("session.*.chat.in", h1).await.unwrap();
        let _s2 = bus.subscribe("session.x.chat.in", h2).await.unwrap();

        bus.publish("session.x.chat.in", Bytes::from_static(b"{}")).await.unwrap();

        assert_eq!(next(&mut rx1).await.subject, "session.x.chat.in");
        assert_eq!(next(&mut rx2).await.subject, "session.x.chat.in");
    }

    #[tokio::test]
    async fn deliveries_are_sequential_and_ordered() {
        let bus = LocalBus::new(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicBool::new(false));
        let flag = in_flight.clone();
        let handler = handler_fn(move |m: BusMessage| {
            let tx = tx.clone();
            let flag = flag.clone();
            async move {
                assert!(!flag.swap(true, Ordering::SeqCst), "handler overlapped");
                tokio::task::yield_now().await;
                flag.store(false, Ordering::SeqCst);
                let _ = tx.send(m.payload);
            }
        });
        let _sub = bus.subscribe("t.*", handler).await.unwrap();

        for i in 0..20u8 {
            bus.publish("t.x", Bytes::from(vec![i])).await.unwrap();
        }
        for i in 0..20u8 {
            let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(payload.as_ref(), &[i]);
        }
    }

    #[tokio::test]
    async fn full_subscription_queue_drops_instead_of_blocking() {
        let bus = LocalBus::new(1);
        let release = Arc::new(Notify::new());
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let started_tx = Arc::new(parking_lot::Mutex::new(Some(started_tx)));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let gate = release.clone();
        let handler = handler_fn(move |m: BusMessage| {
            let gate = gate.clone();
            let started = started_tx.lock().take();
            let seen_tx = seen_tx.clone();
            async move {
                if let Some(started) = started {
                    let _ = started.send(());
                    gate.notified().await;
                }
                let _ = seen_tx.send(m.payload);
            }
        });
        let _sub = bus.subscribe("q", handler).await.unwrap();

        bus.publish("q", Bytes::from_static(b"1")).await.unwrap();
        started_rx.await.unwrap();
        // Handler is parked on message 1: one slot left in the queue.
        bus.publish("q", Bytes::from_static(b"2")).await.unwrap();
        bus.publish("q", Bytes::from_static(b"3")).await.unwrap();
        release.notify_one();

        let mut seen = Vec::new();
        while let Ok(Some(p)) =
            tokio::time::timeout(Duration::from_millis(200), seen_rx.recv()).await
        {
            seen.push(p);
        }
        assert_eq!(seen, vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_and_drains() {
        let bus = LocalBus::new(16);
        let (handler, mut rx) = collector();
        let sub = bus.subscribe("a.b", handler).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);

        bus.publish("a.b", Bytes::from_static(b"before")).await.unwrap();
        sub.unsubscribe().await;
        assert_eq!(bus.subscription_count(), 0);
        bus.publish("a.b", Bytes::from_static(b"after")).await.unwrap();

        assert_eq!(next(&mut rx).await.payload, Bytes::from_static(b"before"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_bus_rejects_operations() {
        let bus = LocalBus::new(4);
        let (handler, _rx) = collector();
        let _sub = bus.subscribe("x", handler.clone()).await.unwrap();
        bus.close().await;
        assert_eq!(bus.subscription_count(), 0);
        assert!(matches!(
            bus.publish("x", Bytes::new()).await,
            Err(BusError::Closed)
        ));
        assert!(matches!(bus.subscribe("x", handler).await, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn rejects_malformed_subjects() {
        let bus = LocalBus::new(4);
        assert!(matches!(
            bus.publish("session.*.chat.in", Bytes::new()).await,
            Err(BusError::InvalidSubject(_))
        ));
        assert!(matches!(
            bus.publish("session..chat", Bytes::new()).await,
            Err(BusError::InvalidSubject(_))
        ));
        let (handler, _rx) = collector();
        assert!(matches!(
            bus.subscribe("a..b", handler).await,
            Err(BusError::InvalidSubject(_))
        ));
    }

    #[tokio::test]
    async fn publish_json_encodes_payload() {
        let bus = LocalBus::new(4);
        let (handler, mut rx) = collector();
        let _sub = bus.subscribe("j", handler).await.unwrap();
        publish_json(&bus, "j", &serde_json::json!({"k": 1})).await.unwrap();
        let msg = next(&mut rx).await;
        let v: serde_json::Value = msg.decode().unwrap();
        assert_eq!(v["k"], 1);
    }
}
