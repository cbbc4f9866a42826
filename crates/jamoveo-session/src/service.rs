//! Session service: the single task that owns every mutation.
//!
//! Admissions, actions and evictions arrive as commands over one `mpsc`
//! channel and are handled strictly in arrival order. Commit and publish
//! happen inside the same command, so every observer sees snapshots in
//! commit order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jamoveo_catalog::SongCatalog;
use jamoveo_core::{ActionMessage, ConnectionId, Identity, SessionError, SessionState, frame};
use jamoveo_settings::SessionSettings;
use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{Broadcaster, snapshot_frame};
use crate::registry::{Connection, ConnectionRegistry, Frame, RegistryError};
use crate::router::{ActionRouter, DEFAULT_LOOKUP_TIMEOUT};
use crate::store::{Commit, SessionStore};

/// Limits for one service instance.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Maximum simultaneously admitted connections.
    pub max_connections: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Depth of the command channel.
    pub command_buffer: usize,
    /// Upper bound on one catalog lookup for `song_chosen`.
    pub lookup_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for ServiceConfig {
    fn from(s: &SessionSettings) -> Self {
        Self {
            max_connections: s.max_connections,
            send_queue_capacity: s.send_queue_capacity,
            command_buffer: s.command_buffer,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// Why a connection is being removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictReason {
    /// The peer closed the socket.
    Closed,
    /// Reading from or writing to the socket failed.
    TransportError,
    /// The outbound queue was full or closed.
    SendFailed,
    /// No activity within the heartbeat timeout.
    HeartbeatTimeout,
    /// The service is shutting down.
    Shutdown,
}

impl EvictReason {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::TransportError => "transport_error",
            Self::SendFailed => "send_failed",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Shutdown => "shutdown",
        }
    }

    /// The delivery failure behind this eviction, if any.
    pub fn delivery_error(self, connection: &ConnectionId) -> Option<SessionError> {
        match self {
            Self::TransportError | Self::SendFailed => Some(SessionError::Transport {
                connection: connection.clone(),
            }),
            Self::Closed | Self::HeartbeatTimeout | Self::Shutdown => None,
        }
    }
}

impl fmt::Display for EvictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures talking to the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Admission refused by the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The service loop is no longer running.
    #[error("session service is not running")]
    Closed,
}

/// A freshly admitted connection and its outbound queue.
///
/// The queue already holds the snapshot current at admission.
#[derive(Debug)]
pub struct Admission {
    /// Registered connection; its cancel token fires on eviction.
    pub connection: Arc<Connection>,
    /// Frames to write to the socket, in order.
    pub outbound: mpsc::Receiver<Frame>,
}

enum Command {
    Admit {
        identity: Identity,
        reply: oneshot::Sender<Result<Admission, ServiceError>>,
    },
    Action {
        connection: ConnectionId,
        raw: String,
    },
    Evict {
        connection: ConnectionId,
        reason: EvictReason,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front door to a running [`SessionService`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
}

impl SessionHandle {
    /// Admit a verified identity.
    pub async fn admit(&self, identity: Identity) -> Result<Admission, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Admit { identity, reply }).await?;
        rx.await.map_err(|_| ServiceError::Closed)?
    }

    /// Queue a raw inbound frame from `connection`.
    pub async fn submit(
        &self,
        connection: &ConnectionId,
        raw: impl Into<String>,
    ) -> Result<(), ServiceError> {
        self.send(Command::Action {
            connection: connection.clone(),
            raw: raw.into(),
        })
        .await
    }

    /// Queue removal of `connection`. Repeated calls are harmless.
    pub async fn evict(
        &self,
        connection: &ConnectionId,
        reason: EvictReason,
    ) -> Result<(), ServiceError> {
        self.send(Command::Evict {
            connection: connection.clone(),
            reason,
        })
        .await
    }

    /// Wait until every command queued before this call has been handled.
    pub async fn flush(&self) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply }).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Latest committed state. Never waits on the service loop.
    pub fn snapshot(&self) -> Arc<SessionState> {
        self.store.read()
    }

    /// Latest committed state with its revision.
    pub fn commit_info(&self) -> Commit {
        self.store.snapshot()
    }

    /// Number of admitted connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// The registry, for transport-level liveness checks.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServiceError::Closed)
    }
}

/// Composition root: one store, one router, one broadcaster, one registry.
///
/// Catalog lookups for `song_chosen` are awaited on the loop itself, so a
/// slow catalog delays every queued command (admissions included) by up to
/// [`ServiceConfig::lookup_timeout`].
pub struct SessionService {
    config: ServiceConfig,
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    router: ActionRouter,
    broadcaster: Broadcaster,
    commands: mpsc::Receiver<Command>,
}

impl SessionService {
    /// Build a service and the handle that feeds it.
    pub fn new(config: ServiceConfig, catalog: Arc<dyn SongCatalog>) -> (Self, SessionHandle) {
        let store = Arc::new(SessionStore::new());
        let registry = Arc::new(ConnectionRegistry::new(config.max_connections));
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let handle = SessionHandle {
            commands: tx,
            store: Arc::clone(&store),
            registry: Arc::clone(&registry),
        };
        let service = Self {
            router: ActionRouter::new(Arc::clone(&store), catalog)
                .with_lookup_timeout(config.lookup_timeout),
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            config,
            store,
            registry,
            commands: rx,
        };
        (service, handle)
    }

    /// Build and spawn a service on the current runtime.
    pub fn spawn(
        config: ServiceConfig,
        catalog: Arc<dyn SongCatalog>,
        cancel: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(config, catalog);
        let task = tokio::spawn(service.run(cancel));
        (handle, task)
    }

    /// Process commands until `cancel` fires or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            max_connections = self.config.max_connections,
            send_queue = self.config.send_queue_capacity,
            "session service started"
        );
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
            }
        }
        self.shutdown();
    }

    async fn dispatch(&self, command: Command) {
        match command {
            Command::Admit { identity, reply } => self.admit(identity, reply),
            Command::Action { connection, raw } => self.action(&connection, &raw).await,
            Command::Evict { connection, reason } => self.evict(connection, reason),
            Command::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn admit(
        &self,
        identity: Identity,
        reply: oneshot::Sender<Result<Admission, ServiceError>>,
    ) {
        let username = identity.username.clone();
        let (connection, outbound) =
            match self.registry.admit(identity, self.config.send_queue_capacity) {
                Ok(admitted) => admitted,
                Err(e) => {
                    warn!(user = %username, error = %e, "admission refused");
                    counter!("ws_connections_rejected_total").increment(1);
                    let _ = reply.send(Err(e.into()));
                    return;
                }
            };

        counter!("ws_connections_total").increment(1);
        gauge!("ws_connections_active").increment(1.0);
        info!(
            conn_id = %connection.id(),
            user = %username,
            role = %connection.identity().role,
            connections = self.registry.len(),
            "connection admitted"
        );

        // Late joiners start from the state current at admission.
        let initial = snapshot_frame(&self.store.read());
        if let Some(frame) = initial {
            let _ = connection.send(frame);
        }

        let id = connection.id().clone();
        if reply
            .send(Ok(Admission {
                connection,
                outbound,
            }))
            .is_err()
        {
            debug!(conn_id = %id, "admission requester went away");
            self.evict(id, EvictReason::Closed);
        }
    }

    async fn action(&self, id: &ConnectionId, raw: &str) {
        let Some(connection) = self.registry.get(id) else {
            debug!(conn_id = %id, "action from evicted connection ignored");
            return;
        };
        connection.mark_alive();

        let result = match ActionMessage::parse(raw) {
            Ok(action) => {
                let kind = action.kind();
                let result = self.router.handle(connection.identity(), action).await;
                let outcome = match &result {
                    Ok(Some(_)) => "committed",
                    Ok(None) => "unchanged",
                    Err(e) => e.error_kind(),
                };
                counter!("session_actions_total", "action" => kind.as_str(), "outcome" => outcome)
                    .increment(1);
                result
            }
            Err(e) => {
                counter!("session_actions_total", "action" => "unknown", "outcome" => e.error_kind())
                    .increment(1);
                Err(e)
            }
        };

        match result {
            Ok(Some(commit)) => self.publish(&commit),
            Ok(None) => {}
            Err(e) => self.reply_error(&connection, &e),
        }
    }

    fn publish(&self, commit: &Commit) {
        counter!("session_broadcasts_total").increment(1);
        let failed = self.broadcaster.publish(&commit.state);
        for id in failed {
            self.evict(id, EvictReason::SendFailed);
        }
    }

    fn reply_error(&self, connection: &Connection, error: &SessionError) {
        debug!(conn_id = %connection.id(), code = error.code(), error = %error, "action rejected");
        let sent = match frame::error_json(error) {
            Ok(json) => connection.send(Arc::from(json)),
            Err(e) => {
                warn!(error = %e, "failed to serialize error frame");
                true
            }
        };
        if !sent {
            self.evict(connection.id().clone(), EvictReason::SendFailed);
        }
    }

    /// Remove a connection; an admin leaving forces the session back to idle.
    ///
    /// Send failures during the resulting broadcast are evicted in turn,
    /// iteratively.
    fn evict(&self, id: ConnectionId, reason: EvictReason) {
        let mut pending = VecDeque::from([(id, reason)]);
        while let Some((id, reason)) = pending.pop_front() {
            let Some(connection) = self.registry.evict(&id) else {
                continue;
            };

            counter!("ws_disconnections_total").increment(1);
            counter!("session_evictions_total", "reason" => reason.as_str()).increment(1);
            gauge!("ws_connections_active").decrement(1.0);
            info!(
                conn_id = %id,
                user = %connection.identity().username,
                reason = %reason,
                age_secs = connection.age().as_secs(),
                dropped = connection.drop_count(),
                "connection evicted"
            );
            if let Some(error) = reason.delivery_error(&id) {
                warn!(code = error.code(), error = %error, "delivery failed");
            }

            if !connection.is_admin() {
                continue;
            }
            if let Some(commit) = self.router.leader_departed() {
                info!(conn_id = %id, revision = commit.revision, "leader left, rehearsal stopped");
                counter!("session_broadcasts_total").increment(1);
                for failed in self.broadcaster.publish(&commit.state) {
                    pending.push_back((failed, EvictReason::SendFailed));
                }
            }
        }
    }

    fn shutdown(&self) {
        let connections = self.registry.all();
        for connection in &connections {
            let _ = self.registry.evict(connection.id());
        }
        counter!("session_evictions_total", "reason" => EvictReason::Shutdown.as_str())
            .increment(connections.len() as u64);
        gauge!("ws_connections_active").set(0.0);
        info!(closed = connections.len(), "session service stopped");
    }
}
