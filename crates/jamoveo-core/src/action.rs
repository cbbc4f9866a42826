//! Inbound leader instructions.
//!
//! Frames look like `{"kind": "song_chosen", "song_id": "..."}`. The
//! discriminator is also accepted under `action`, and `songId` is accepted
//! for `song_id`. Any other field is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::ids::SongId;

/// Discriminator of an [`ActionMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Turn rehearsal mode on.
    StartRehearsal,
    /// Put a song in play.
    SongChosen,
    /// Take the current song out of play.
    SongNotChosen,
    /// Turn rehearsal mode off.
    StopRehearsal,
}

impl ActionKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartRehearsal => "start_rehearsal",
            Self::SongChosen => "song_chosen",
            Self::SongNotChosen => "song_not_chosen",
            Self::StopRehearsal => "stop_rehearsal",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated inbound action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionMessage {
    /// Turn rehearsal mode on.
    StartRehearsal,
    /// Put the given catalog song in play.
    SongChosen {
        /// Catalog id to resolve.
        song_id: SongId,
    },
    /// Clear the current song.
    SongNotChosen,
    /// Turn rehearsal mode off.
    StopRehearsal,
}

#[derive(Deserialize)]
struct RawAction {
    #[serde(alias = "action")]
    kind: ActionKind,
    #[serde(default, alias = "songId")]
    song_id: Option<String>,
}

impl ActionMessage {
    /// Discriminator of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::StartRehearsal => ActionKind::StartRehearsal,
            Self::SongChosen { .. } => ActionKind::SongChosen,
            Self::SongNotChosen => ActionKind::SongNotChosen,
            Self::StopRehearsal => ActionKind::StopRehearsal,
        }
    }

    /// Parse an inbound text frame.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let raw: RawAction = serde_json::from_str(text)
            .map_err(|e| SessionError::Malformed(format!("invalid action: {e}")))?;
        match raw.kind {
            ActionKind::StartRehearsal => Ok(Self::StartRehearsal),
            ActionKind::SongNotChosen => Ok(Self::SongNotChosen),
            ActionKind::StopRehearsal => Ok(Self::StopRehearsal),
            ActionKind::SongChosen => {
                let song_id = raw
                    .song_id
                    .map(|s| s.trim().to_owned())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        SessionError::Malformed("song_chosen requires song_id".into())
                    })?;
                Ok(Self::SongChosen {
                    song_id: SongId::from_raw(song_id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_field() {
        let msg = ActionMessage::parse(r#"{"kind":"start_rehearsal"}"#).unwrap();
        assert_eq!(msg, ActionMessage::StartRehearsal);
    }

    #[test]
    fn parses_legacy_action_field_and_ignores_extras() {
        let msg = ActionMessage::parse(
            r#"{"action":"song_chosen","song_id":"abc","artist":"Queen","username":"dana"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ActionMessage::SongChosen {
                song_id: SongId::from_raw("abc")
            }
        );
    }

    #[test]
    fn accepts_camel_case_song_id() {
        let msg = ActionMessage::parse(r#"{"kind":"song_chosen","songId":"xyz"}"#).unwrap();
        assert_eq!(msg.kind(), ActionKind::SongChosen);
    }

    #[test]
    fn song_chosen_without_id_is_malformed() {
        let err = ActionMessage::parse(r#"{"kind":"song_chosen"}"#).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));

        let err = ActionMessage::parse(r#"{"kind":"song_chosen","song_id":"  "}"#).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn unknown_kind_is_malformed() {
        let err = ActionMessage::parse(r#"{"kind":"dance"}"#).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_MESSAGE");
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(ActionMessage::parse("not json").is_err());
        assert!(ActionMessage::parse("[1,2]").is_err());
        assert!(ActionMessage::parse("{}").is_err());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ActionMessage::SongChosen {
            song_id: SongId::from_raw("s9"),
        })
        .unwrap();
        assert_eq!(json["kind"], "song_chosen");
        assert_eq!(json["song_id"], "s9");

        let json = serde_json::to_value(ActionMessage::StopRehearsal).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "stop_rehearsal"}));
    }

    #[test]
    fn serialized_actions_parse_back() {
        for msg in [
            ActionMessage::StartRehearsal,
            ActionMessage::SongNotChosen,
            ActionMessage::StopRehearsal,
        ] {
            let text = serde_json::to_string(&msg).unwrap();
            assert_eq!(ActionMessage::parse(&text).unwrap(), msg);
        }
    }
}
