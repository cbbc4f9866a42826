//! Outbound wire frames.
//!
//! Observers receive two kinds of text frames: full state snapshots
//! (broadcast) and error frames (sent only to the connection whose action
//! was rejected).

use serde::Serialize;

use crate::errors::SessionError;
use crate::state::SessionState;

/// Error reply sent to a single requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    /// Human-readable message.
    pub error: String,
    /// Stable code from [`SessionError::code`].
    pub code: &'static str,
}

impl From<&SessionError> for ErrorFrame {
    fn from(err: &SessionError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
        }
    }
}

/// Serialize a full snapshot frame.
pub fn snapshot_json(state: &SessionState) -> Result<String, serde_json::Error> {
    serde_json::to_string(state)
}

/// Serialize an error frame.
pub fn error_json(err: &SessionError) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ErrorFrame::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn error_frame_shape() {
        let err = SessionError::Unauthorized {
            action: ActionKind::SongChosen,
        };
        let json: serde_json::Value = serde_json::from_str(&error_json(&err).unwrap()).unwrap();
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert!(json["error"].as_str().unwrap().contains("song_chosen"));
    }

    #[test]
    fn snapshot_frame_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&snapshot_json(&SessionState::Waiting).unwrap()).unwrap();
        assert_eq!(json["rehearsal_state"], "active");
        assert!(json["current_song"].is_null());
    }
}
