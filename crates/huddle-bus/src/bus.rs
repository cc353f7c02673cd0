//! The bus contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::errors::{BusError, Result};

/// A message delivered to a subscription.
#[derive(Clone, Debug)]
pub struct BusMessage {
    /// Concrete subject the message was published on.
    pub subject: String,
    /// Encoded payload.
    pub payload: Bytes,
}

impl BusMessage {
    /// Decode the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|source| BusError::Decode {
            subject: self.subject.clone(),
            source,
        })
    }
}

/// Callback attached to a subscription.
///
/// Calls for one subscription never overlap and arrive in delivery order.
/// Handlers must not wait on anything that depends on their own completion.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one delivery.
    async fn handle(&self, message: BusMessage);
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, message: BusMessage) {
        (self.0)(message).await;
    }
}

/// Wrap an async closure as a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Subject-addressed publish/subscribe transport.
///
/// Delivery is at-most-once. Ordering holds only within one subscription.
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Publish `payload` on a concrete subject.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()>;

    /// Subscribe `handler` to every subject matching `pattern`.
    async fn subscribe(&self, pattern: &str, handler: Arc<dyn MessageHandler>)
    -> Result<Subscription>;

    /// Drop every subscription and reject further publishes.
    async fn close(&self);
}

/// Serialize `value` as JSON and publish it.
pub async fn publish_json<T: Serialize + ?Sized>(
    bus: &dyn Bus,
    subject: &str,
    value: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(value).map_err(BusError::Encode)?;
    bus.publish(subject, Bytes::from(payload)).await
}

/// Handle to a live subscription.
///
/// Dropping the handle leaves the subscription active; call
/// [`Subscription::unsubscribe`] to stop it.
pub struct Subscription {
    pattern: String,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
    dispatcher: JoinHandle<()>,
}

impl Subscription {
    /// Assemble a handle from a detach hook and the dispatcher task.
    pub fn new(
        pattern: impl Into<String>,
        detach: impl FnOnce() + Send + Sync + 'static,
        dispatcher: JoinHandle<()>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            detach: Some(Box::new(detach)),
            dispatcher,
        }
    }

    /// Pattern this subscription was created with.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Stop receiving new messages, then wait until already queued
    /// messages have been handled.
    pub async fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
        let _ = (&mut self.dispatcher).await;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[test]
    fn decode_reads_json_payload() {
        let msg = BusMessage {
            subject: "a.b".into(),
            payload: Bytes::from_static(br#"{"n":7}"#),
        };
        assert_eq!(msg.decode::<Ping>().unwrap(), Ping { n: 7 });
    }

    #[test]
    fn decode_failure_carries_subject() {
        let msg = BusMessage {
            subject: "a.b".into(),
            payload: Bytes::from_static(b"garbage"),
        };
        match msg.decode::<Ping>() {
            Err(BusError::Decode { subject, .. }) => assert_eq!(subject, "a.b"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_runs_detach_and_awaits_dispatcher() {
        let detached = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = detached.clone();
        let sub = Subscription::new(
            "a.*",
            move || flag.store(true, std::sync::atomic::Ordering::SeqCst),
            tokio::spawn(async {}),
        );
        assert_eq!(sub.pattern(), "a.*");
        sub.unsubscribe().await;
        assert!(detached.load(std::sync::atomic::Ordering::SeqCst));
    }
}
