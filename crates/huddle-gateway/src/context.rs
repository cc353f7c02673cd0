//! Shared state handed to HTTP handlers, connection tasks and bus callbacks.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use huddle_bus::Bus;

use crate::config::GatewayConfig;
use crate::provisioning::Provisioner;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::cache::SessionCache;
use crate::websocket::registry::ClientRegistry;

/// Everything a gateway component needs, built once at startup.
pub struct GatewayContext {
    /// Runtime configuration.
    pub config: GatewayConfig,
    /// Bus used for every publish and subscription.
    pub bus: Arc<dyn Bus>,
    /// Pending users and known sessions.
    pub provisioner: Provisioner,
    /// Live connections per session.
    pub registry: ClientRegistry,
    /// Chat read cache for `sync`.
    pub cache: SessionCache,
    /// Cancellation root.
    pub shutdown: ShutdownCoordinator,
}

impl GatewayContext {
    /// Build a context around `bus`.
    pub fn new(config: GatewayConfig, bus: Arc<dyn Bus>) -> Self {
        Self {
            provisioner: Provisioner::new(bus.clone(), config.token_ttl),
            config,
            bus,
            registry: ClientRegistry::new(),
            cache: SessionCache::new(),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Drop expired tokens and forget idle sessions nobody is connected to.
    /// Returns `(tokens, sessions)` removed.
    pub fn sweep(&self) -> (usize, usize) {
        let tokens = self.provisioner.expire_tokens();
        let forgotten = self
            .provisioner
            .forget_idle_sessions(|sid| self.registry.has_session(sid));
        for sid in &forgotten {
            self.cache.forget(sid);
        }
        if tokens > 0 || !forgotten.is_empty() {
            debug!(tokens, sessions = forgotten.len(), "sweep");
        }
        (tokens, forgotten.len())
    }
}

/// Sweep once per token TTL until shutdown.
pub async fn run_sweeper(ctx: Arc<GatewayContext>) {
    let period = ctx.config.token_ttl;
    let stop = ctx.shutdown.token();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {
                let _ = ctx.sweep();
            }
        }
    }
    info!("sweeper stopped");
}
