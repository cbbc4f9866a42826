//! # jamoveo-server
//!
//! Axum HTTP + `WebSocket` transport for the rehearsal session.
//!
//! - `GET /ws`: authenticated observer channel (snapshots out, actions in)
//! - `GET /health`, `GET /metrics`: liveness and Prometheus text
//! - `GET /search/songs`, `GET /songs/{id}`: catalog passthrough
//! - `GET /validate_token`: identity behind a bearer token
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod credentials;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{ApiError, ServerError};
pub use server::{AppState, JamServer};
pub use shutdown::ShutdownCoordinator;
