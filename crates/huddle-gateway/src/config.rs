//! Gateway configuration.

use std::time::Duration;

use huddle_settings::HuddleSettings;

/// Runtime configuration of the gateway.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Capacity of each client's outbound queue.
    pub queue_capacity: usize,
    /// Upper bound on one socket write.
    pub write_wait: Duration,
    /// Read deadline, refreshed by every Pong.
    pub pong_wait: Duration,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// How long a connect token stays claimable. Also the idle period
    /// after which an unattended session is forgotten.
    pub token_ttl: Duration,
}

impl GatewayConfig {
    /// Derive the gateway configuration from loaded settings.
    pub fn from_settings(settings: &HuddleSettings) -> Self {
        let g = &settings.gateway;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            queue_capacity: g.queue_capacity,
            write_wait: g.write_wait(),
            pong_wait: g.pong_wait(),
            max_message_size: g.max_message_size,
            token_ttl: g.token_ttl(),
        }
    }

    /// Keepalive Ping interval, nine tenths of [`Self::pong_wait`].
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::from_settings(&HuddleSettings::default())
        }
    }
}
