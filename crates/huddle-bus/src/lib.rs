//! # huddle-bus
//!
//! The publish/subscribe contract every huddle component talks through.
//!
//! - [`Bus`]: subject-addressed publish and wildcard subscribe
//! - [`MessageHandler`]: callback invoked sequentially per subscription
//! - [`Subscription`]: handle used to unsubscribe and drain
//! - [`LocalBus`]: in-process implementation with at-most-once delivery
//!
//! Only the `local` scheme is provided; [`connect`] rejects anything else.

#![deny(unsafe_code)]

pub mod bus;
pub mod errors;
pub mod local;

use std::sync::Arc;

pub use bus::{Bus, BusMessage, MessageHandler, Subscription, handler_fn, publish_json};
pub use errors::{BusError, Result};
pub use local::LocalBus;

/// Connect to the bus named by `url`.
///
/// `subscription_capacity` bounds each subscription's pending queue; a
/// publish that finds the queue full is dropped for that subscriber.
pub fn connect(url: &str, subscription_capacity: usize) -> Result<Arc<dyn Bus>> {
    match url.split_once("://").map_or(url, |(scheme, _)| scheme) {
        "local" => Ok(Arc::new(LocalBus::new(subscription_capacity))),
        other => Err(BusError::Connect(format!(
            "unsupported bus scheme '{other}' in {url}"
        ))),
    }
}
