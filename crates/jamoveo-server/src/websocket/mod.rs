//! `WebSocket` transport: per-connection reader/writer tasks and liveness.

pub mod heartbeat;
pub mod session;

pub use heartbeat::{HeartbeatPolicy, Liveness};
pub use session::run_ws_session;
