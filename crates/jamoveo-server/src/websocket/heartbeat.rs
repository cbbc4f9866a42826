//! Ping/pong liveness checks.

use std::time::Duration;

use jamoveo_session::Connection;

use crate::config::ServerConfig;

/// Ping cadence and tolerated silence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    /// Time between pings.
    pub interval: Duration,
    /// Silence after which the connection is dead.
    pub timeout: Duration,
}

impl From<&ServerConfig> for HeartbeatPolicy {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.heartbeat_interval(),
            timeout: config.heartbeat_timeout(),
        }
    }
}

/// Result of one heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    /// Inbound activity since the previous tick.
    Active,
    /// Nothing since the previous tick, still within the timeout.
    Quiet,
    /// Silent for longer than the timeout.
    Dead,
}

/// Check and reset `connection`'s activity flag.
pub fn probe(connection: &Connection, timeout: Duration) -> Liveness {
    if connection.check_alive() {
        Liveness::Active
    } else if connection.last_seen_elapsed() > timeout {
        Liveness::Dead
    } else {
        Liveness::Quiet
    }
}
