//! # huddle-gateway
//!
//! Axum HTTP + `WebSocket` gateway between browsers and the bus.
//!
//! - `POST /session/new` provisions a user and a one-time connect token
//! - `GET /ws?token=` upgrades and runs one read task and one write task per client
//! - `<domain>.out` broadcasts are fanned out to every local client of the session
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod provisioning;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::GatewayConfig;
pub use errors::GatewayError;
pub use provisioning::{PendingUser, Provisioner, Ticket};
pub use server::GatewayServer;
pub use shutdown::ShutdownCoordinator;
pub use websocket::ingest::IngestHandle;
