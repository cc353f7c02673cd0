//! WebSocket connection management, broadcast fan-out and the sync cache.

pub mod actions;
pub mod cache;
pub mod connection;
pub mod ingest;
pub mod registry;
pub mod session;
