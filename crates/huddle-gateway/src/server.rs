//! `GatewayServer`: Axum HTTP + WebSocket front door.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use huddle_bus::Bus;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::context::{GatewayContext, run_sweeper};
use crate::errors::GatewayError;
use crate::health;
use crate::provisioning::Ticket;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::ingest::{self, IngestHandle};
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway context.
    pub ctx: Arc<GatewayContext>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The huddle connection gateway.
pub struct GatewayServer {
    ctx: Arc<GatewayContext>,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a gateway publishing to and subscribing on `bus`.
    pub fn new(config: GatewayConfig, bus: Arc<dyn Bus>) -> Self {
        Self {
            ctx: Arc::new(GatewayContext::new(config, bus)),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            ctx: self.ctx.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/session/new", post(new_session_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Subscribe to outbound broadcasts of every domain.
    pub async fn start_ingest(&self) -> huddle_bus::Result<IngestHandle> {
        ingest::start_ingest(self.ctx.clone()).await
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.ctx.config.host, self.ctx.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;
        let router = self.router();
        let stop = self.ctx.shutdown.token();
        let _sweeper = tokio::spawn(run_sweeper(self.ctx.clone()));

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                error!(error = %err, "http server failed");
            }
        });
        info!(addr = %local, "gateway listening");
        Ok((local, handle))
    }

    /// Stop accepting work and close every live connection.
    ///
    /// Returns how many connections were closed.
    pub fn begin_shutdown(&self) -> usize {
        self.ctx.shutdown.shutdown();
        let closed = self.ctx.registry.close_all();
        info!(closed, "gateway draining");
        closed
    }

    /// Live WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.ctx.registry.connection_count()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.ctx.shutdown
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.ctx.config
    }

    /// Get the shared context.
    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }
}

#[derive(Debug, Deserialize)]
struct NewSessionRequest {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "SessionID", default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

/// POST /session/new
///
/// The body is decoded as JSON whatever its declared content type.
async fn new_session_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Ticket>, GatewayError> {
    let request: NewSessionRequest = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::BadRequest(err.to_string()))?;
    let session_id = request.session_id.as_deref().filter(|sid| !sid.is_empty());
    let ticket = state
        .ctx
        .provisioner
        .create_or_join(&request.username, session_id)
        .await?;
    Ok(Json(ticket))
}

/// GET /ws?token=
async fn ws_handler(
    State(state): State<AppState>,
    query: Result<Query<WsQuery>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ctx = state.ctx;
    let Query(WsQuery { token }) = match query {
        Ok(query) => query,
        Err(rejection) => return GatewayError::BadRequest(rejection.body_text()).into_response(),
    };
    if ctx.shutdown.is_shutting_down() {
        return health::ready_check(true).into_response();
    }
    if !ctx.provisioner.is_pending(&token) {
        warn!("websocket request with unknown or expired token");
        return GatewayError::UnknownToken.into_response();
    }
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };
    let Some(pending) = ctx.provisioner.claim(&token) else {
        return GatewayError::UnknownToken.into_response();
    };

    upgrade
        .max_message_size(ctx.config.max_message_size)
        .on_failed_upgrade(|err| warn!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_ws_session(socket, pending, ctx))
}

/// GET /health
async fn health_handler() -> Json<&'static str> {
    health::health_check()
}

/// GET /ready
async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<&'static str>) {
    health::ready_check(state.ctx.shutdown.is_shutting_down())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
