//! Session error taxonomy.
//!
//! Every variant is scoped to the connection that caused it; none of them is
//! fatal to the service.

use crate::action::ActionKind;
use crate::ids::{ConnectionId, SongId};
use crate::state::Phase;

/// Why an inbound action was rejected or a connection was dropped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A non-admin attempted a leader action.
    #[error("not authorized to {action}: leader role required")]
    Unauthorized {
        /// The rejected action.
        action: ActionKind,
    },

    /// The action is not valid in the current state.
    #[error("cannot {action} while session is {phase}")]
    InvalidTransition {
        /// The rejected action.
        action: ActionKind,
        /// State the session was in when the action was evaluated.
        phase: Phase,
    },

    /// The requested song could not be resolved.
    #[error("song {song_id} not found: {reason}")]
    LookupFailed {
        /// Id the leader asked for.
        song_id: SongId,
        /// Catalog-provided detail.
        reason: String,
    },

    /// The inbound frame could not be understood.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Delivery to a connection failed; the connection is evicted.
    #[error("failed to deliver to connection {connection}")]
    Transport {
        /// The connection that could not be reached.
        connection: ConnectionId,
    },
}

impl SessionError {
    /// Stable machine-readable code, sent to the requester in error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::LookupFailed { .. } => "SONG_NOT_FOUND",
            Self::Malformed(_) => "MALFORMED_MESSAGE",
            Self::Transport { .. } => "TRANSPORT",
        }
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::Malformed(_) => "malformed",
            Self::Transport { .. } => "transport",
        }
    }
}
