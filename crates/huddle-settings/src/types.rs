//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every struct is `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "gateway": { "pongWaitMs": 60000 },
///   "logging": { "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Per-connection WebSocket limits and keepalive.
    pub gateway: GatewaySettings,
    /// Bus connection.
    pub bus: BusSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
        }
    }
}

/// WebSocket connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Capacity of each client's outbound queue.
    pub queue_capacity: usize,
    /// Upper bound on a single socket write, in milliseconds.
    pub write_wait_ms: u64,
    /// Read deadline, refreshed by every Pong, in milliseconds.
    pub pong_wait_ms: u64,
    /// Largest accepted inbound frame, in bytes. Must fit a whole
    /// workspace `update` with its code and schema snapshots.
    pub max_message_size: usize,
    /// How long an issued connect token stays claimable, in milliseconds.
    pub token_ttl_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: 200,
            write_wait_ms: 10_000,
            pong_wait_ms: 30_000,
            max_message_size: 64 * 1024,
            token_ttl_ms: 60_000,
        }
    }
}

impl GatewaySettings {
    /// Write timeout.
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    /// Read deadline.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Connect token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_millis(self.token_ttl_ms)
    }

    /// Ping interval: nine tenths of the read deadline, so a ping always
    /// lands before the deadline it is meant to refresh.
    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms * 9 / 10)
    }
}

/// Bus connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusSettings {
    /// Bus URL. Only `local://` is built in.
    pub url: String,
    /// Pending-message bound of each subscription.
    pub subscription_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            url: "local://".to_string(),
            subscription_capacity: 1024,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}
