//! Live connection tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use jamoveo_core::{ConnectionId, Identity};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outbound text frame, shared between every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Admission failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The service already holds its maximum number of connections.
    #[error("connection limit reached ({limit})")]
    CapacityReached {
        /// Configured maximum.
        limit: usize,
    },
}

/// One admitted observer.
pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    connected_at: Instant,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped_frames: AtomicU64,
}

impl Connection {
    /// Create a connection with a fresh id.
    pub fn new(identity: Identity, tx: mpsc::Sender<Frame>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            identity,
            tx,
            cancel: CancellationToken::new(),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Verified identity behind this connection.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether this connection may drive the session.
    pub fn is_admin(&self) -> bool {
        self.identity.is_admin()
    }

    /// Enqueue a frame without waiting.
    ///
    /// Returns `false` if the queue is full or closed, and increments the
    /// dropped frame counter.
    pub fn send(&self, frame: Frame) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Frames that could not be enqueued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Token cancelled when the connection is evicted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel every task tied to this connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Record inbound activity (pong, frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last inbound activity (or admission).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.identity.username)
            .field("role", &self.identity.role)
            .finish_non_exhaustive()
    }
}

/// All admitted connections, indexed by id.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    capacity: usize,
}

impl ConnectionRegistry {
    /// Registry admitting at most `capacity` connections.
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            capacity,
        }
    }

    /// Register a new connection with an outbound queue of `queue_capacity`.
    ///
    /// The capacity check and insert are not atomic with respect to each
    /// other; callers serialize admissions.
    pub fn admit(
        &self,
        identity: Identity,
        queue_capacity: usize,
    ) -> Result<(Arc<Connection>, mpsc::Receiver<Frame>), RegistryError> {
        if self.connections.len() >= self.capacity {
            return Err(RegistryError::CapacityReached {
                limit: self.capacity,
            });
        }
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let connection = Arc::new(Connection::new(identity, tx));
        let _ = self
            .connections
            .insert(connection.id().clone(), Arc::clone(&connection));
        Ok((connection, rx))
    }

    /// Remove a connection and cancel its tasks.
    ///
    /// Only the first call for a given id returns the connection.
    pub fn evict(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let (_, connection) = self.connections.remove(id)?;
        connection.close();
        Some(connection)
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Enqueue a frame to one connection. `false` if unknown or not accepted.
    pub fn send_to(&self, id: &ConnectionId, frame: Frame) -> bool {
        self.get(id).is_some_and(|c| c.send(frame))
    }

    /// Number of admitted connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is admitted.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Configured maximum.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connections holding the admin role.
    pub fn admins(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|c| c.is_admin())
            .map(|c| Arc::clone(c.value()))
            .collect()
    }

    /// Point-in-time copy of every connection.
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|c| Arc::clone(c.value()))
            .collect()
    }
}
