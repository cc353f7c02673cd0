//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before anything records. The returned handle
/// renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket connections currently open (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connections torn down (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Outbound frames dropped on a full client queue (counter).
pub const WS_QUEUE_DROPS_TOTAL: &str = "ws_queue_drops_total";
/// Sessions created through `/session/new` (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Connect tokens issued and not yet claimed or expired (gauge).
pub const PENDING_TOKENS: &str = "pending_tokens";
/// Connect tokens that expired unclaimed (counter).
pub const TOKENS_EXPIRED_TOTAL: &str = "tokens_expired_total";
