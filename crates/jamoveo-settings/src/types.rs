//! Settings sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JamoveoSettings {
    /// HTTP/WebSocket listener.
    pub server: ServerSettings,
    /// Session core limits.
    pub session: SessionSettings,
    /// Credential verification.
    pub auth: AuthSettings,
    /// Song catalog.
    pub catalog: CatalogSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl JamoveoSettings {
    /// Reject combinations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "heartbeatTimeoutSecs ({}) must be >= heartbeatIntervalSecs ({})",
                self.server.heartbeat_timeout_secs, self.server.heartbeat_interval_secs
            )));
        }
        if self.session.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.session.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "maxConnections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Interval between server pings, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a connection is considered dead, in seconds.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_message_size: 64 * 1024,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

/// Limits of the session coordination core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Maximum simultaneously admitted connections.
    pub max_connections: usize,
    /// Per-connection outbound queue depth; a full queue evicts the connection.
    pub send_queue_capacity: usize,
    /// Depth of the command channel feeding the session loop.
    pub command_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_connections: 256,
            send_queue_capacity: 64,
            command_buffer: 1024,
        }
    }
}

/// Credential verification settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret. Must be set before serving.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt_secret: String,
    /// Lifetime of tokens minted by `jamoveo token`.
    pub token_ttl_minutes: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: 10,
        }
    }
}

/// Song catalog settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSettings {
    /// SQLite file; relative paths resolve under `~/.jamoveo`.
    pub db_path: String,
    /// Maximum number of search results.
    pub search_limit: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            db_path: "catalog.db".to_string(),
            search_limit: 50,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`RUST_LOG` takes precedence).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"jamoveo_session": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
