//! Snapshot fan-out to every registered connection.

use std::sync::Arc;

use jamoveo_core::{ConnectionId, SessionState, frame};
use tracing::{debug, warn};

use crate::registry::{ConnectionRegistry, Frame};

/// Pushes full state snapshots to all connections.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Broadcaster over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Serialize `state` once and enqueue it everywhere.
    ///
    /// Returns the connections whose queue was full or closed; the caller
    /// evicts them.
    pub fn publish(&self, state: &SessionState) -> Vec<ConnectionId> {
        match snapshot_frame(state) {
            Some(frame) => self.publish_frame(&frame),
            None => Vec::new(),
        }
    }

    /// Enqueue an already serialized frame everywhere.
    pub fn publish_frame(&self, frame: &Frame) -> Vec<ConnectionId> {
        let recipients = self.registry.all();
        let mut failed = Vec::new();
        for conn in &recipients {
            if !conn.send(Arc::clone(frame)) {
                warn!(conn_id = %conn.id(), dropped = conn.drop_count(), "failed to enqueue snapshot");
                failed.push(conn.id().clone());
            }
        }
        debug!(
            recipients = recipients.len(),
            failed = failed.len(),
            "snapshot broadcast"
        );
        failed
    }
}

/// Serialize a snapshot frame, logging (not propagating) failures.
pub fn snapshot_frame(state: &SessionState) -> Option<Frame> {
    match frame::snapshot_json(state) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize snapshot");
            None
        }
    }
}
